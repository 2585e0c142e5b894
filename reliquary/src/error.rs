// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {crate::paths::PathScope, thiserror::Error};

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum ReliquaryError {
    #[error("storage root is not configured")]
    NotConfigured,

    #[error("illegal character in {0} path")]
    InvalidName(PathScope),

    #[error("{0} path escapes the storage root")]
    PathEscape(PathScope),

    #[error("not found")]
    NotFound,

    #[error("multiple rows where at most one was expected: {key}")]
    AmbiguousRow { key: String },

    #[error("upstream returned status {0}")]
    UpstreamFailed(u16),

    #[error("failed to decode upstream payload")]
    DecodeFailed,

    #[error("xsendfile frontend not supported: {0}")]
    Unimplemented(String),

    #[error("control file parse error: {0}")]
    ControlParseError(String),

    #[error("required field missing in control file: {0}")]
    ControlRequiredFieldMissing(&'static str),

    #[error("no control file found in package archive")]
    ControlFileNotFound,

    #[error("unknown entry in binary package archive: {0}")]
    DebUnknownBinaryPackageEntry(String),

    #[error("unknown compression in deb archive file: {0}")]
    DebUnknownCompression(String),

    #[error("database error: {0:?}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0:?}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0:?}")]
    Url(#[from] url::ParseError),

    #[error("config file error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, ReliquaryError>;
