// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Streaming a stored relic out as an HTTP response.

When `xsendfile_enabled` is set and the configured front end is nginx, the
response carries an `X-Accel-Redirect` header and no body, letting the
front-end web server serve the file. Any other front end yields a
501-style response. Otherwise the file is streamed directly.
*/

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use reliquary::{paths::resolve_relic_paths, ReliquaryError};
use tokio_util::io::ReaderStream;

use crate::{errors::ApiError, state::AppState};

/// Guess the content type (and transfer encoding, for compressed
/// suffixes) of a relic from its filename.
pub fn guess_mime(name: &str) -> (&'static str, Option<&'static str>) {
    let lower = name.to_lowercase();

    if lower.ends_with(".tar.gz") {
        ("application/x-tar", Some("gzip"))
    } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") {
        ("application/x-tar", Some("bzip2"))
    } else if lower.ends_with(".tar.xz") {
        ("application/x-tar", Some("xz"))
    } else if lower.ends_with(".tgz") {
        ("application/x-gzip", None)
    } else if lower.ends_with(".gz") {
        ("application/octet-stream", Some("gzip"))
    } else if lower.ends_with(".bz2") {
        ("application/octet-stream", Some("bzip2"))
    } else if lower.ends_with(".deb") {
        ("application/x-debian-package", None)
    } else if lower.ends_with(".whl") || lower.ends_with(".zip") || lower.ends_with(".egg") {
        ("application/zip", None)
    } else if lower.ends_with(".tar") {
        ("application/x-tar", None)
    } else if lower.ends_with(".dsc") || lower.ends_with(".txt") {
        ("text/plain", None)
    } else if lower.ends_with(".json") {
        ("application/json", None)
    } else {
        ("application/octet-stream", None)
    }
}

fn relic_headers(
    relic_name: &str,
    content_length: u64,
) -> Result<HeaderMap, axum::http::header::InvalidHeaderValue> {
    let (mime, encoding) = guess_mime(relic_name);

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", relic_name))?,
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&content_length.to_string())?,
    );
    if let Some(encoding) = encoding {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding));
    }

    Ok(headers)
}

/// Emit a stored relic as a download response.
pub async fn download_response(
    state: &AppState,
    channel: &str,
    index: &str,
    relic_name: &str,
) -> Result<Response, ApiError> {
    let settings = &state.settings.reliquary;

    let paths = resolve_relic_paths(
        settings.location.as_deref(),
        channel,
        index,
        Some(relic_name),
    )?;
    let relic_abs_path = paths.file.as_deref().expect("relic name was supplied");

    let frontend = settings.xsendfile_frontend.trim().to_lowercase();
    if settings.xsendfile_enabled && frontend != "nginx" {
        return Err(ReliquaryError::Unimplemented(frontend).into());
    }

    let metadata = tokio::fs::metadata(relic_abs_path)
        .await
        .map_err(|_| ReliquaryError::NotFound)?;

    let mut headers = relic_headers(relic_name, metadata.len())
        .map_err(|_| ReliquaryError::NotFound)?;

    // Hand the actual byte shuffling to the front-end server when enabled.
    if settings.xsendfile_enabled {
        let value = HeaderValue::from_str(&relic_abs_path.to_string_lossy())
            .map_err(|_| ReliquaryError::NotFound)?;
        headers.insert("X-Accel-Redirect", value);

        return Ok((StatusCode::OK, headers).into_response());
    }

    let file = tokio::fs::File::open(relic_abs_path)
        .await
        .map_err(|_| ReliquaryError::NotFound)?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((StatusCode::OK, headers, body).into_response())
}
