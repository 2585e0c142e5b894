// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Proxy-mode fetch-and-persist.

When a proxy route is asked for a relic that is not stored locally, the
relic is downloaded from the given upstream URL, written at its storage
path, and registered in the catalog so subsequent requests are served
locally. Concurrent requests for the same relic serialize on a keyed lock,
so at most one download per `(channel, index, relic_name)` is in flight.
*/

use {
    crate::{
        error::{ReliquaryError, Result},
        io::mtime_text,
        paths::resolve_relic_paths,
        settings::Settings,
        store::Store,
    },
    std::{collections::HashMap, sync::Arc},
    tokio::sync::Mutex,
    tracing::info,
};

/// A set of locks preventing concurrent fetches of the same relic.
#[derive(Debug, Default)]
pub struct Locks(Mutex<HashMap<String, Arc<Mutex<()>>>>);

impl Locks {
    /// Acquire the lock handle for a relic key.
    pub async fn acquire(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.0.lock().await;
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Download a relic from `upstream` unless it is already cataloged.
///
/// A non-2xx upstream response is an error and nothing is written: a
/// failed download must not masquerade as a stored relic.
#[allow(clippy::too_many_arguments)]
pub async fn fetch_relic_if_missing(
    store: &Store,
    settings: &Settings,
    client: &reqwest::Client,
    locks: &Locks,
    channel: &str,
    index: &str,
    relic_name: &str,
    upstream: &str,
) -> Result<()> {
    let key = format!("{}/{}/{}", channel, index, relic_name);
    let lock = locks.acquire(&key).await;
    let _guard = lock.lock().await;

    if store.relic_by_names(channel, index, relic_name).await?.is_some() {
        return Ok(());
    }

    let paths = resolve_relic_paths(
        settings.reliquary.location.as_deref(),
        channel,
        index,
        Some(relic_name),
    )?;
    let file = paths.file.as_deref().expect("relic name was supplied");

    tokio::fs::create_dir_all(&paths.folder).await?;

    let response = client.get(upstream).send().await?;
    if !response.status().is_success() {
        return Err(ReliquaryError::UpstreamFailed(response.status().as_u16()));
    }
    let body = response.bytes().await?;

    tokio::fs::write(file, &body).await?;

    let metadata = tokio::fs::metadata(file).await?;
    let mtime = mtime_text(metadata.modified()?);

    let channel_row = store.upsert_channel(channel).await?;
    let index_row = store.upsert_index(channel_row.id, index).await?;
    store
        .insert_relic(index_row.id, relic_name, &mtime, metadata.len() as i64)
        .await?;

    info!(%key, upstream, "fetched and persisted relic");

    Ok(())
}
