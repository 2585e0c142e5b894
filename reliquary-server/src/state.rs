// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Shared per-process server state. */

use reliquary::{fetch::Locks, settings::Settings, store::Store};
use std::sync::Arc;

/// State shared by every request handler.
#[derive(Debug)]
pub struct AppState {
    pub store: Store,
    pub settings: Settings,
    pub http: reqwest::Client,
    pub locks: Locks,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Store, settings: Settings) -> SharedState {
        Arc::new(Self {
            store,
            settings,
            http: reqwest::Client::new(),
            locks: Locks::default(),
        })
    }
}
