// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The raw upload/download API and the landing page. */

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use reliquary::paths::resolve_relic_paths;

use crate::{
    auth::{authenticated_groups, unauthorized},
    download::download_response,
    errors::{json_response, ApiError},
    handlers::{request_base, route_url},
    listing::{directory_listing, ListingItem},
    state::SharedState,
};

/// `PUT /api/v1/raw/{channel}/{index}/{relic_name}` — store an uploaded
/// relic. Requires authentication.
///
/// The upload only writes the file; the catalog learns about it at the
/// next reindex sweep.
pub async fn put_relic(
    State(state): State<SharedState>,
    Path((channel, index, relic_name)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let settings = &state.settings.reliquary;

    if authenticated_groups(settings, &headers).is_none() {
        return unauthorized(&settings.realm);
    }

    let paths = match resolve_relic_paths(
        settings.location.as_deref(),
        &channel,
        &index,
        Some(&relic_name),
    ) {
        Ok(paths) => paths,
        Err(e) => return ApiError(e).into_response(),
    };
    let relic_path = paths.file.as_deref().expect("relic name was supplied");

    if let Err(e) = tokio::fs::create_dir_all(&paths.folder).await {
        return ApiError(e.into()).into_response();
    }
    if let Err(e) = tokio::fs::write(relic_path, &body).await {
        return ApiError(e.into()).into_response();
    }

    json_response(StatusCode::OK, r#"{"status":"ok"}"#)
}

/// `GET /api/v1/raw/{channel}/{index}/{relic_name}` — download a relic.
pub async fn get_relic(
    State(state): State<SharedState>,
    Path((channel, index, relic_name)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    download_response(&state, &channel, &index, &relic_name).await
}

/// `GET /api/v1/` — list every known channel/index pair.
pub async fn home(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let base = request_base(&headers);

    let items = state
        .store
        .channel_index_pairs()
        .await?
        .into_iter()
        .map(|(channel, index)| {
            ListingItem::folder(
                route_url(&base, &["autoindex", &channel, &index], true),
                format!("{}/{}", channel, index),
            )
        })
        .collect::<Vec<_>>();

    Ok(directory_listing("Reliquary indices", &items, false).into_response())
}
