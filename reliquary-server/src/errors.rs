// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Mapping of core errors onto canonical HTTP responses. */

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use reliquary::{paths::PathScope, ReliquaryError};
use tracing::error;

/// Build a JSON response from a status code and a pre-rendered body.
pub fn json_response(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.into(),
    )
        .into_response()
}

/// A core error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ReliquaryError);

impl From<ReliquaryError> for ApiError {
    fn from(e: ReliquaryError) -> Self {
        Self(e)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self(ReliquaryError::from(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            ReliquaryError::NotConfigured => json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"status":"error","reliquary not configured"}"#,
            ),
            ReliquaryError::InvalidName(PathScope::Location)
            | ReliquaryError::PathEscape(PathScope::Location) => json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"status":"error","invalid channel/index"}"#,
            ),
            ReliquaryError::InvalidName(PathScope::RelicName)
            | ReliquaryError::PathEscape(PathScope::RelicName) => json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"status":"error","invalid relic name"}"#,
            ),
            ReliquaryError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ReliquaryError::AmbiguousRow { key } => {
                error!("ambiguous catalog row treated as not found: {}", key);
                StatusCode::NOT_FOUND.into_response()
            }
            ReliquaryError::UpstreamFailed(status) => json_response(
                StatusCode::NOT_FOUND,
                format!(r#"{{"status":"error","upstream had error {}"}}"#, status),
            ),
            ReliquaryError::DecodeFailed => json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"status":"error decoding of upstream json failed"}"#,
            ),
            ReliquaryError::Unimplemented(_) => json_response(
                StatusCode::NOT_IMPLEMENTED,
                r#"{"status":"not implemented yet -- only nginx xsend support is enabled"}"#,
            ),
            other => {
                error!("request failed: {}", other);
                json_response(StatusCode::INTERNAL_SERVER_ERROR, r#"{"status":"error"}"#)
            }
        }
    }
}
