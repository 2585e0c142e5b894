// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Request handlers, one module per protocol surface. */

pub mod api;
pub mod autoindex;
pub mod commonjs;
pub mod debian;
pub mod pypi;

use axum::http::{header, HeaderMap};
use url::Url;

/// Reconstruct the external base URL (`scheme://host`) of a request.
///
/// Honors `X-Forwarded-Proto` when a front-end proxy sets it.
pub fn request_base(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}

/// Build an absolute URL for an `/api/v1/` route from path segments.
///
/// Segments are percent-encoded as needed.
pub fn route_url(base: &str, segments: &[&str], trailing_slash: bool) -> String {
    match Url::parse(base) {
        Ok(mut url) => {
            {
                let mut path = match url.path_segments_mut() {
                    Ok(path) => path,
                    Err(()) => return format!("{}/api/v1/{}", base, segments.join("/")),
                };
                path.clear();
                path.extend(["api", "v1"]);
                path.extend(segments);
                if trailing_slash {
                    path.push("");
                }
            }
            url.to_string()
        }
        Err(_) => format!("{}/api/v1/{}", base, segments.join("/")),
    }
}

/// The absolute URL of the raw download route for a relic.
pub fn raw_relic_url(base: &str, channel: &str, index: &str, relic_name: &str) -> String {
    route_url(base, &["raw", channel, index, relic_name], false)
}
