// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! nginx-autoindex-compatible listing of an index's relics. */

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::DateTime;

use crate::{
    errors::{json_response, ApiError},
    handlers::{raw_relic_url, request_base},
    listing::autoindex_page,
    state::SharedState,
};

fn right_justify(value: &str, width: usize) -> String {
    if value.len() >= width {
        value.to_string()
    } else {
        format!("{:>width$}", value, width = width)
    }
}

/// Format a catalog mtime (textual float of epoch seconds) the way the
/// listing column expects it.
fn format_mtime(mtime: &str) -> String {
    let secs = mtime.parse::<f64>().unwrap_or(0.0);
    DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.format("%d-%b-%Y %H:%M").to_string())
        .unwrap_or_default()
}

/// `GET /api/v1/autoindex/{channel}/{index}/`
pub async fn autoindex(
    State(state): State<SharedState>,
    Path((channel, index)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(indexobj) = state.store.index_by_names(&channel, &index).await? else {
        return Ok(json_response(
            StatusCode::NOT_FOUND,
            r#"{"status":"error","channel/index not found"}"#,
        ));
    };

    let relics = state.store.relics_of_index(indexobj.id).await?;
    if relics.is_empty() {
        return Ok(json_response(
            StatusCode::NOT_FOUND,
            r#"{"status":"error","/channel/index not found"}"#,
        ));
    }

    let base = request_base(&headers);
    let lines = relics
        .iter()
        .map(|relic| {
            let url = raw_relic_url(&base, &channel, &index, &relic.name);
            let mtime = format_mtime(&relic.mtime);

            format!(
                "<a href=\"{}\">{}</a>{}{}",
                url,
                relic.name,
                right_justify(&mtime, 79usize.saturating_sub(relic.name.len())),
                right_justify(&relic.size.to_string(), 20),
            )
        })
        .collect::<Vec<_>>();

    let display_path = format!("/autoindex/{}/{}", channel, index);
    Ok(autoindex_page(&display_path, &lines).into_response())
}
