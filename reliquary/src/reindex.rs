// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Filesystem-to-catalog reconciliation.

The sweep walks the storage root three directory levels deep — channels,
indices, relic files — and reconciles the catalog with what is actually on
disk. It first marks every cataloged row dirty, clears the flag on each
row it re-encounters during the walk, and finally deletes whatever is
still dirty. Files outside the three-level shape are ignored.

Each relic is handled in its own error scope: an undecodable `.deb` or an
unreadable file is logged and skipped, never aborting the sweep. Catalog
errors are fatal.
*/

use {
    crate::{
        deb::{debinfo_record, read_deb_artifact},
        error::{ReliquaryError, Result},
        io::mtime_text,
        metadata::pregenerate_deb_indices,
        settings::Settings,
        store::{IndexRow, Store},
    },
    std::path::Path,
    tracing::{error, info, warn},
};

fn utf8_file_name(entry: &std::fs::DirEntry) -> Option<String> {
    match entry.file_name().into_string() {
        Ok(name) => Some(name),
        Err(raw) => {
            warn!("skipping non-UTF-8 directory entry {:?}", raw);
            None
        }
    }
}

/// Reconcile one relic file with the catalog.
async fn index_relic(store: &Store, index: &IndexRow, name: &str, path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)?;
    let mtime = mtime_text(metadata.modified()?);
    let size = metadata.len() as i64;

    let relic = match store.relic_by_index_and_name(index.id, name).await {
        Ok(Some(existing)) => {
            store.update_relic_clean(existing.id, &mtime, size).await?;
            existing
        }
        Ok(None) => store.insert_relic(index.id, name, &mtime, size).await?,
        Err(ReliquaryError::AmbiguousRow { key }) => {
            // Uniqueness violation: leave the rows alone and move on.
            error!("catalog contains non-unique channel/index/relic_name: {}", key);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if name.ends_with(".deb") {
        let artifact = read_deb_artifact(path)?;
        let record = debinfo_record(&artifact, &index.name, name)?;
        store.upsert_debinfo(relic.id, &record).await?;
    }

    Ok(())
}

/// Run the full reindex sweep against the configured storage root.
pub async fn reindex(store: &Store, settings: &Settings) -> Result<()> {
    let root = settings
        .reliquary
        .location
        .as_deref()
        .ok_or(ReliquaryError::NotConfigured)?;

    // Mark everything dirty so whatever is not re-encountered on disk can
    // be deleted at the end of the sweep.
    store.mark_all_dirty().await?;

    for channel_entry in std::fs::read_dir(root)? {
        let channel_entry = channel_entry?;
        if !channel_entry.file_type()?.is_dir() {
            continue;
        }
        let Some(channel_name) = utf8_file_name(&channel_entry) else {
            continue;
        };

        let channel = store.upsert_channel(&channel_name).await?;

        for index_entry in std::fs::read_dir(channel_entry.path())? {
            let index_entry = index_entry?;
            if !index_entry.file_type()?.is_dir() {
                continue;
            }
            let Some(index_name) = utf8_file_name(&index_entry) else {
                continue;
            };

            let index = store.upsert_index(channel.id, &index_name).await?;

            for relic_entry in std::fs::read_dir(index_entry.path())? {
                let relic_entry = relic_entry?;
                if !relic_entry.file_type()?.is_file() {
                    continue;
                }
                let Some(relic_name) = utf8_file_name(&relic_entry) else {
                    continue;
                };

                match index_relic(store, &index, &relic_name, &relic_entry.path()).await {
                    Ok(()) => {}
                    // Catalog failures abort the sweep; anything local to
                    // the one relic is logged and skipped.
                    Err(e @ ReliquaryError::Database(_)) => return Err(e),
                    Err(e) => {
                        error!(
                            "failed to index {}/{}/{}: {}",
                            channel_name, index_name, relic_name, e
                        );
                    }
                }
            }
        }
    }

    store.delete_dirty().await?;

    pregenerate_deb_indices(store).await?;

    info!("reindex sweep complete");

    Ok(())
}
