// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! HTTP surface for the reliquary artifact repository.

This crate wires the `reliquary` core to an axum router: the raw
upload/download API, the autoindex listing, the PEP-503 simple index, the
CommonJS registry documents and the Debian repository tree, each in a
self-hosted and (where applicable) proxy flavor. It also hosts the CLI
with the `serve` and `reindex` subcommands.
*/

pub mod auth;
pub mod cli;
pub mod download;
pub mod errors;
pub mod handlers;
pub mod listing;
pub mod server;
pub mod state;
