// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! PEP-503 simple index, self-hosted and proxied. */

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use reliquary::{
    fetch::fetch_relic_if_missing,
    names::{normalize_pypi_package_name, PypiName},
    ReliquaryError,
};
use std::collections::BTreeSet;

use crate::{
    download::download_response,
    errors::ApiError,
    handlers::{raw_relic_url, request_base},
    listing::simple_page,
    state::SharedState,
};

const PYPI_UPSTREAM: &str = "https://pypi.python.org";

/// `GET /api/v1/python/{channel}/{index}/simple/` — one anchor per
/// distinct (normalized) package name.
pub async fn simple_index(
    State(state): State<SharedState>,
    Path((channel, index)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let mut names = BTreeSet::new();

    if let Some(indexobj) = state.store.index_by_names(&channel, &index).await? {
        for relic in state.store.relics_of_index(indexobj.id).await? {
            names.insert(normalize_pypi_package_name(&PypiName::parse(&relic.name).package));
        }
    }

    let lines = names
        .into_iter()
        .map(|name| format!("<a href='{0}'>{0}</a><br/>", name))
        .collect::<Vec<_>>();

    Ok(simple_page(&lines).into_response())
}

/// `GET /api/v1/python/{channel}/{index}/simple/{package}/` — every relic
/// whose parsed package name normalizes to the requested name.
pub async fn simple_package(
    State(state): State<SharedState>,
    Path((channel, index, package)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let package = normalize_pypi_package_name(&package);
    let base = request_base(&headers);

    let mut matched = Vec::new();
    if let Some(indexobj) = state.store.index_by_names(&channel, &index).await? {
        for relic in state.store.relics_of_index(indexobj.id).await? {
            let normalized = normalize_pypi_package_name(&PypiName::parse(&relic.name).package);
            if normalized == package {
                matched.push((relic.name, normalized));
            }
        }
    }
    matched.sort_by(|a, b| a.1.cmp(&b.1));

    let lines = matched
        .into_iter()
        .map(|(name, _)| {
            format!(
                "<a href='{}' rel='internal'>{}</a><br/>",
                raw_relic_url(&base, &channel, &index, &name),
                name
            )
        })
        .collect::<Vec<_>>();

    Ok(simple_page(&lines).into_response())
}

async fn passthrough_html(state: &SharedState, url: &str) -> Result<Response, ApiError> {
    let response = state.http.get(url).send().await?;

    if response.status().as_u16() != 200 {
        return Err(ReliquaryError::UpstreamFailed(response.status().as_u16()).into());
    }

    let text = response.text().await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html")],
        text,
    )
        .into_response())
}

/// `GET /api/v1/python/proxy/{channel}/{index}/simple/` — upstream
/// passthrough of the public simple index.
pub async fn proxy_simple(
    State(state): State<SharedState>,
    Path((_channel, _index)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    passthrough_html(&state, &format!("{}/simple/", PYPI_UPSTREAM)).await
}

/// `GET /api/v1/python/proxy/{channel}/{index}/simple/{package}/`
pub async fn proxy_simple_package(
    State(state): State<SharedState>,
    Path((_channel, _index, package)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    passthrough_html(&state, &format!("{}/simple/{}/", PYPI_UPSTREAM, package)).await
}

/// `GET /api/v1/python/proxy/{channel}/{index}/packages/{a}/{b}/{hash}/{package}`
///
/// Mirrors the historic pypi.python.org package URL layout. Fetches the
/// distribution from upstream on first access and serves it locally from
/// then on.
pub async fn proxy_package(
    State(state): State<SharedState>,
    Path((channel, index, parta, partb, hashval, package)): Path<(
        String,
        String,
        String,
        String,
        String,
        String,
    )>,
) -> Result<Response, ApiError> {
    // Strip any checksum fragment from the package component.
    let relic_name = package.split('#').next().unwrap_or(&package).to_string();
    let upstream = format!(
        "{}/packages/{}/{}/{}/{}",
        PYPI_UPSTREAM, parta, partb, hashval, package
    );

    let fetched = fetch_relic_if_missing(
        &state.store,
        &state.settings,
        &state.http,
        &state.locks,
        &channel,
        &index,
        &relic_name,
        &upstream,
    )
    .await;

    if let Err(e) = fetched {
        match e {
            ReliquaryError::UpstreamFailed(_) | ReliquaryError::Http(_) => {
                return Err(e.into());
            }
            // Path problems surface with their canonical bodies from the
            // download path below.
            _ => {}
        }
    }

    download_response(&state, &channel, &index, &relic_name).await
}
