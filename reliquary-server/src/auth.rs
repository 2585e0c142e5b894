// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! HTTP basic authentication against the configured credential list.

Read-only routes are open to everyone. Uploads require the `put`
permission, which every authenticated user holds.
*/

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reliquary::settings::ReliquarySettings;

/// Resolve the group list for the request's basic auth credentials.
///
/// Returns [None] when no valid `Authorization` header is present or the
/// credentials do not match.
pub fn authenticated_groups(
    settings: &ReliquarySettings,
    headers: &HeaderMap,
) -> Option<Vec<String>> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;

    settings.authenticate(username, password)
}

/// The canonical 401 challenge for the configured realm.
pub fn unauthorized(realm: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            format!("Basic realm=\"{}\"", realm),
        )],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ReliquarySettings {
        ReliquarySettings {
            auth: "alice:secret:admin".to_string(),
            ..Default::default()
        }
    }

    fn header_for(user: &str, password: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", user, password))
        );
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn accepts_configured_credentials() {
        let groups = authenticated_groups(&settings(), &header_for("alice", "secret"));
        assert_eq!(groups, Some(vec!["admin".to_string()]));
    }

    #[test]
    fn rejects_wrong_password_and_missing_header() {
        assert!(authenticated_groups(&settings(), &header_for("alice", "wrong")).is_none());
        assert!(authenticated_groups(&settings(), &HeaderMap::new()).is_none());
    }
}
