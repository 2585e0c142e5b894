// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The relic catalog.

A SQLite-backed relational record of channels, indices, relics, extracted
Debian control data, and the generated-metadata blob cache. All mutations
run in explicit transactions. Lookups that may yield "zero or one" row use
a bounded fetch that distinguishes none, exactly one, and multiple rows —
the last is a data-integrity signal surfaced as
[ReliquaryError::AmbiguousRow], never silently reduced.
*/

use {
    crate::error::{ReliquaryError, Result},
    sqlx::{
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
        SqlitePool,
    },
    std::str::FromStr,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS channels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        dirty INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS indices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        channel_id INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        dirty INTEGER NOT NULL DEFAULT 0,
        UNIQUE (channel_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS relics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        index_id INTEGER NOT NULL REFERENCES indices(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        mtime TEXT NOT NULL,
        size INTEGER NOT NULL,
        dirty INTEGER NOT NULL DEFAULT 0,
        UNIQUE (index_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS debinfo (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        relic_id INTEGER NOT NULL UNIQUE REFERENCES relics(id) ON DELETE CASCADE,
        filename TEXT NOT NULL,
        md5sum TEXT NOT NULL,
        sha1 TEXT NOT NULL,
        sha256 TEXT NOT NULL,
        sha512 TEXT NOT NULL,
        description_md5 TEXT NOT NULL,
        multi_arch TEXT,
        package TEXT NOT NULL,
        version TEXT NOT NULL,
        architecture TEXT NOT NULL,
        maintainer TEXT NOT NULL,
        description TEXT NOT NULL,
        source TEXT,
        section TEXT,
        priority TEXT,
        essential TEXT,
        depends TEXT,
        recommends TEXT,
        suggests TEXT,
        enhances TEXT,
        pre_depends TEXT,
        installed_size TEXT,
        homepage TEXT,
        built_using TEXT
    )",
    "CREATE TABLE IF NOT EXISTS filecache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key TEXT NOT NULL UNIQUE,
        value BLOB NOT NULL,
        mtime TEXT NOT NULL,
        size INTEGER NOT NULL,
        md5sum TEXT NOT NULL,
        sha1 TEXT NOT NULL,
        sha256 TEXT NOT NULL
    )",
];

/// A top-level namespace directory under the storage root.
#[derive(Clone, Debug, Eq, PartialEq, sqlx::FromRow)]
pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub dirty: bool,
}

/// A second-level namespace scoped under a channel.
#[derive(Clone, Debug, Eq, PartialEq, sqlx::FromRow)]
pub struct IndexRow {
    pub id: i64,
    pub channel_id: i64,
    pub name: String,
    pub dirty: bool,
}

/// A single stored artifact file.
#[derive(Clone, Debug, Eq, PartialEq, sqlx::FromRow)]
pub struct RelicRow {
    pub id: i64,
    pub index_id: i64,
    pub name: String,
    pub mtime: String,
    pub size: i64,
    pub dirty: bool,
}

/// Extracted control data for a `.deb` relic, 1:1 with its relic row.
#[derive(Clone, Debug, Eq, PartialEq, sqlx::FromRow)]
pub struct DebInfoRow {
    pub id: i64,
    pub relic_id: i64,
    pub filename: String,
    pub md5sum: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
    pub description_md5: String,
    pub multi_arch: Option<String>,
    pub package: String,
    pub version: String,
    pub architecture: String,
    pub maintainer: String,
    pub description: String,
    pub source: Option<String>,
    pub section: Option<String>,
    pub priority: Option<String>,
    pub essential: Option<String>,
    pub depends: Option<String>,
    pub recommends: Option<String>,
    pub suggests: Option<String>,
    pub enhances: Option<String>,
    pub pre_depends: Option<String>,
    pub installed_size: Option<String>,
    pub homepage: Option<String>,
    pub built_using: Option<String>,
}

/// Control data for a `.deb` relic as produced by the extractor, without
/// row identity.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NewDebInfo {
    pub filename: String,
    pub md5sum: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
    pub description_md5: String,
    pub multi_arch: Option<String>,
    pub package: String,
    pub version: String,
    pub architecture: String,
    pub maintainer: String,
    pub description: String,
    pub source: Option<String>,
    pub section: Option<String>,
    pub priority: Option<String>,
    pub essential: Option<String>,
    pub depends: Option<String>,
    pub recommends: Option<String>,
    pub suggests: Option<String>,
    pub enhances: Option<String>,
    pub pre_depends: Option<String>,
    pub installed_size: Option<String>,
    pub homepage: Option<String>,
    pub built_using: Option<String>,
}

/// A cached generated-metadata blob.
#[derive(Clone, Debug, Eq, PartialEq, sqlx::FromRow)]
pub struct FileCacheRow {
    pub id: i64,
    pub key: String,
    pub value: Vec<u8>,
    pub mtime: String,
    pub size: i64,
    pub md5sum: String,
    pub sha1: String,
    pub sha256: String,
}

/// Joined relic/debinfo data backing one `Packages` paragraph.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct PackageParagraphRow {
    pub relic_name: String,
    pub relic_size: i64,
    pub filename: String,
    pub md5sum: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
    pub description_md5: String,
    pub multi_arch: Option<String>,
    pub package: String,
    pub version: String,
    pub architecture: String,
    pub maintainer: String,
    pub description: String,
    pub source: Option<String>,
    pub section: Option<String>,
    pub priority: Option<String>,
    pub essential: Option<String>,
    pub depends: Option<String>,
    pub recommends: Option<String>,
    pub suggests: Option<String>,
    pub enhances: Option<String>,
    pub pre_depends: Option<String>,
    pub installed_size: Option<String>,
    pub homepage: Option<String>,
    pub built_using: Option<String>,
}

fn none_or_one<T>(mut rows: Vec<T>, key: impl FnOnce() -> String) -> Result<Option<T>> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        _ => Err(ReliquaryError::AmbiguousRow { key: key() }),
    }
}

/// Handle on the catalog database.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to the catalog at the given SQLite URL, creating the
    /// database file and schema if missing.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// An in-memory catalog for tests.
    ///
    /// Limited to a single pooled connection so every query observes the
    /// same in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Close the underlying pool, waiting for connections to be released.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn init_schema(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Mark every channel, index and relic row dirty.
    ///
    /// The reindex sweep calls this first; rows still dirty at the end of
    /// the sweep no longer exist on disk and are deleted.
    pub async fn mark_all_dirty(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE channels SET dirty = 1").execute(&mut *tx).await?;
        sqlx::query("UPDATE indices SET dirty = 1").execute(&mut *tx).await?;
        sqlx::query("UPDATE relics SET dirty = 1").execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete every row still marked dirty.
    pub async fn delete_dirty(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM relics WHERE dirty = 1").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM indices WHERE dirty = 1").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM channels WHERE dirty = 1").execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Insert or refresh a channel, clearing its dirty flag.
    pub async fn upsert_channel(&self, name: &str) -> Result<ChannelRow> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ChannelRow>(
            "INSERT INTO channels (name, dirty) VALUES (?1, 0)
             ON CONFLICT (name) DO UPDATE SET dirty = 0
             RETURNING id, name, dirty",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Insert or refresh an index under a channel, clearing its dirty flag.
    pub async fn upsert_index(&self, channel_id: i64, name: &str) -> Result<IndexRow> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, IndexRow>(
            "INSERT INTO indices (channel_id, name, dirty) VALUES (?1, ?2, 0)
             ON CONFLICT (channel_id, name) DO UPDATE SET dirty = 0
             RETURNING id, channel_id, name, dirty",
        )
        .bind(channel_id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Insert a relic row with a clear dirty flag.
    pub async fn insert_relic(
        &self,
        index_id: i64,
        name: &str,
        mtime: &str,
        size: i64,
    ) -> Result<RelicRow> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RelicRow>(
            "INSERT INTO relics (index_id, name, mtime, size, dirty) VALUES (?1, ?2, ?3, ?4, 0)
             ON CONFLICT (index_id, name)
             DO UPDATE SET mtime = excluded.mtime, size = excluded.size, dirty = 0
             RETURNING id, index_id, name, mtime, size, dirty",
        )
        .bind(index_id)
        .bind(name)
        .bind(mtime)
        .bind(size)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Refresh an existing relic row, clearing its dirty flag.
    pub async fn update_relic_clean(&self, id: i64, mtime: &str, size: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE relics SET mtime = ?1, size = ?2, dirty = 0 WHERE id = ?3")
            .bind(mtime)
            .bind(size)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Look up a channel by name.
    pub async fn channel_by_name(&self, name: &str) -> Result<Option<ChannelRow>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            "SELECT id, name, dirty FROM channels WHERE name = ?1 LIMIT 2",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        none_or_one(rows, || format!("channel {}", name))
    }

    /// Look up an index by channel and index name.
    pub async fn index_by_names(&self, channel: &str, index: &str) -> Result<Option<IndexRow>> {
        let rows = sqlx::query_as::<_, IndexRow>(
            "SELECT indices.id, indices.channel_id, indices.name, indices.dirty
             FROM indices
             JOIN channels ON channels.id = indices.channel_id
             WHERE channels.name = ?1 AND indices.name = ?2
             LIMIT 2",
        )
        .bind(channel)
        .bind(index)
        .fetch_all(&self.pool)
        .await?;

        none_or_one(rows, || format!("index {}/{}", channel, index))
    }

    /// All indices under a channel.
    pub async fn indices_of_channel(&self, channel_id: i64) -> Result<Vec<IndexRow>> {
        Ok(sqlx::query_as::<_, IndexRow>(
            "SELECT id, channel_id, name, dirty FROM indices WHERE channel_id = ?1 ORDER BY id",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Every `(channel, index)` name pair in the catalog.
    pub async fn channel_index_pairs(&self) -> Result<Vec<(String, String)>> {
        Ok(sqlx::query_as::<_, (String, String)>(
            "SELECT channels.name, indices.name
             FROM indices
             JOIN channels ON channels.id = indices.channel_id
             ORDER BY channels.name, indices.name",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// All relics of an index, in insertion order.
    pub async fn relics_of_index(&self, index_id: i64) -> Result<Vec<RelicRow>> {
        Ok(sqlx::query_as::<_, RelicRow>(
            "SELECT id, index_id, name, mtime, size, dirty
             FROM relics WHERE index_id = ?1 ORDER BY id",
        )
        .bind(index_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Bounded lookup of a relic by index id and name.
    pub async fn relic_by_index_and_name(
        &self,
        index_id: i64,
        name: &str,
    ) -> Result<Option<RelicRow>> {
        let rows = sqlx::query_as::<_, RelicRow>(
            "SELECT id, index_id, name, mtime, size, dirty
             FROM relics WHERE index_id = ?1 AND name = ?2 LIMIT 2",
        )
        .bind(index_id)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        none_or_one(rows, || format!("relic {}:{}", index_id, name))
    }

    /// Bounded lookup of a relic by channel, index and relic names.
    pub async fn relic_by_names(
        &self,
        channel: &str,
        index: &str,
        name: &str,
    ) -> Result<Option<RelicRow>> {
        let rows = sqlx::query_as::<_, RelicRow>(
            "SELECT relics.id, relics.index_id, relics.name, relics.mtime, relics.size, relics.dirty
             FROM relics
             JOIN indices ON indices.id = relics.index_id
             JOIN channels ON channels.id = indices.channel_id
             WHERE channels.name = ?1 AND indices.name = ?2 AND relics.name = ?3
             LIMIT 2",
        )
        .bind(channel)
        .bind(index)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        none_or_one(rows, || format!("relic {}/{}/{}", channel, index, name))
    }

    /// Extracted control data for a relic, if any.
    pub async fn debinfo_by_relic(&self, relic_id: i64) -> Result<Option<DebInfoRow>> {
        let rows = sqlx::query_as::<_, DebInfoRow>(
            "SELECT * FROM debinfo WHERE relic_id = ?1 LIMIT 2",
        )
        .bind(relic_id)
        .fetch_all(&self.pool)
        .await?;

        none_or_one(rows, || format!("debinfo for relic {}", relic_id))
    }

    /// Insert or update the control data for a relic.
    pub async fn upsert_debinfo(&self, relic_id: i64, info: &NewDebInfo) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO debinfo (
                relic_id, filename, md5sum, sha1, sha256, sha512, description_md5,
                multi_arch, package, version, architecture, maintainer, description,
                source, section, priority, essential, depends, recommends, suggests,
                enhances, pre_depends, installed_size, homepage, built_using
             ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
             )
             ON CONFLICT (relic_id) DO UPDATE SET
                filename = excluded.filename,
                md5sum = excluded.md5sum,
                sha1 = excluded.sha1,
                sha256 = excluded.sha256,
                sha512 = excluded.sha512,
                description_md5 = excluded.description_md5,
                multi_arch = excluded.multi_arch,
                package = excluded.package,
                version = excluded.version,
                architecture = excluded.architecture,
                maintainer = excluded.maintainer,
                description = excluded.description,
                source = excluded.source,
                section = excluded.section,
                priority = excluded.priority,
                essential = excluded.essential,
                depends = excluded.depends,
                recommends = excluded.recommends,
                suggests = excluded.suggests,
                enhances = excluded.enhances,
                pre_depends = excluded.pre_depends,
                installed_size = excluded.installed_size,
                homepage = excluded.homepage,
                built_using = excluded.built_using",
        )
        .bind(relic_id)
        .bind(&info.filename)
        .bind(&info.md5sum)
        .bind(&info.sha1)
        .bind(&info.sha256)
        .bind(&info.sha512)
        .bind(&info.description_md5)
        .bind(&info.multi_arch)
        .bind(&info.package)
        .bind(&info.version)
        .bind(&info.architecture)
        .bind(&info.maintainer)
        .bind(&info.description)
        .bind(&info.source)
        .bind(&info.section)
        .bind(&info.priority)
        .bind(&info.essential)
        .bind(&info.depends)
        .bind(&info.recommends)
        .bind(&info.suggests)
        .bind(&info.enhances)
        .bind(&info.pre_depends)
        .bind(&info.installed_size)
        .bind(&info.homepage)
        .bind(&info.built_using)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Joined relic/debinfo rows for an index whose architecture field
    /// contains the given architecture as a substring.
    ///
    /// The substring match deliberately over-selects (`all`, multi-arch
    /// lists); callers post-filter on exact membership of the
    /// whitespace-split architecture field. Rows come back in relic
    /// insertion order.
    pub async fn package_paragraph_rows(
        &self,
        index_id: i64,
        arch: &str,
    ) -> Result<Vec<PackageParagraphRow>> {
        Ok(sqlx::query_as::<_, PackageParagraphRow>(
            "SELECT
                relics.name AS relic_name,
                relics.size AS relic_size,
                debinfo.filename, debinfo.md5sum, debinfo.sha1, debinfo.sha256,
                debinfo.sha512, debinfo.description_md5, debinfo.multi_arch,
                debinfo.package, debinfo.version, debinfo.architecture,
                debinfo.maintainer, debinfo.description, debinfo.source,
                debinfo.section, debinfo.priority, debinfo.essential,
                debinfo.depends, debinfo.recommends, debinfo.suggests,
                debinfo.enhances, debinfo.pre_depends, debinfo.installed_size,
                debinfo.homepage, debinfo.built_using
             FROM debinfo
             JOIN relics ON relics.id = debinfo.relic_id
             WHERE relics.index_id = ?1
               AND debinfo.architecture LIKE '%' || ?2 || '%'
             ORDER BY relics.id",
        )
        .bind(index_id)
        .bind(arch)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Fetch a cached metadata blob by key.
    pub async fn filecache_get(&self, key: &str) -> Result<Option<FileCacheRow>> {
        let rows = sqlx::query_as::<_, FileCacheRow>(
            "SELECT * FROM filecache WHERE key = ?1 LIMIT 2",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        none_or_one(rows, || format!("filecache {}", key))
    }

    /// Delete a cached metadata blob.
    pub async fn filecache_delete(&self, key: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM filecache WHERE key = ?1")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Insert or replace a cached metadata blob.
    #[allow(clippy::too_many_arguments)]
    pub async fn filecache_put(
        &self,
        key: &str,
        value: &[u8],
        mtime: &str,
        size: i64,
        md5sum: &str,
        sha1: &str,
        sha256: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO filecache (key, value, mtime, size, md5sum, sha1, sha256)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                mtime = excluded.mtime,
                size = excluded.size,
                md5sum = excluded.md5sum,
                sha1 = excluded.sha1,
                sha256 = excluded.sha256",
        )
        .bind(key)
        .bind(value)
        .bind(mtime)
        .bind(size)
        .bind(md5sum)
        .bind(sha1)
        .bind(sha256)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Every channel in the catalog.
    pub async fn channels(&self) -> Result<Vec<ChannelRow>> {
        Ok(sqlx::query_as::<_, ChannelRow>(
            "SELECT id, name, dirty FROM channels ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// Count of relics still marked dirty. Diagnostic helper for tests.
    pub async fn dirty_counts(&self) -> Result<(i64, i64, i64)> {
        let channels: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM channels WHERE dirty = 1")
                .fetch_one(&self.pool)
                .await?;
        let indices: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM indices WHERE dirty = 1")
            .fetch_one(&self.pool)
            .await?;
        let relics: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM relics WHERE dirty = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok((channels.0, indices.0, relics.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_debinfo() -> NewDebInfo {
        NewDebInfo {
            filename: "pool/stable/hello_1.0_amd64.deb".to_string(),
            md5sum: "0".repeat(32),
            sha1: "1".repeat(40),
            sha256: "2".repeat(64),
            sha512: "3".repeat(128),
            description_md5: "4".repeat(32),
            package: "hello".to_string(),
            version: "1.0".to_string(),
            architecture: "amd64".to_string(),
            maintainer: "Someone <someone@example.com>".to_string(),
            description: "an example".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upserts_build_the_hierarchy() -> Result<()> {
        let store = Store::in_memory().await?;

        let channel = store.upsert_channel("alpha").await?;
        let index = store.upsert_index(channel.id, "stable").await?;
        let relic = store
            .insert_relic(index.id, "hello_1.0_amd64.deb", "1.5", 42)
            .await?;

        assert!(!channel.dirty);
        assert_eq!(relic.size, 42);

        // Upserting again keeps identity and refreshes attributes.
        let channel2 = store.upsert_channel("alpha").await?;
        assert_eq!(channel2.id, channel.id);

        let relic2 = store
            .insert_relic(index.id, "hello_1.0_amd64.deb", "2.5", 43)
            .await?;
        assert_eq!(relic2.id, relic.id);
        assert_eq!(relic2.mtime, "2.5");
        assert_eq!(relic2.size, 43);

        let found = store
            .relic_by_names("alpha", "stable", "hello_1.0_amd64.deb")
            .await?
            .expect("relic should resolve by names");
        assert_eq!(found.id, relic.id);

        Ok(())
    }

    #[tokio::test]
    async fn dirty_sweep_deletes_marked_rows() -> Result<()> {
        let store = Store::in_memory().await?;

        let channel = store.upsert_channel("alpha").await?;
        let index = store.upsert_index(channel.id, "stable").await?;
        store.insert_relic(index.id, "ghost.tgz", "1.0", 1).await?;

        store.mark_all_dirty().await?;
        assert_eq!(store.dirty_counts().await?, (1, 1, 1));

        // Refresh only the channel; index and relic stay dirty.
        store.upsert_channel("alpha").await?;
        store.delete_dirty().await?;

        assert_eq!(store.dirty_counts().await?, (0, 0, 0));
        assert!(store.index_by_names("alpha", "stable").await?.is_none());
        assert!(store.channel_by_name("alpha").await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn debinfo_cascades_with_relic() -> Result<()> {
        let store = Store::in_memory().await?;

        let channel = store.upsert_channel("alpha").await?;
        let index = store.upsert_index(channel.id, "stable").await?;
        let relic = store
            .insert_relic(index.id, "hello_1.0_amd64.deb", "1.0", 10)
            .await?;

        store.upsert_debinfo(relic.id, &sample_debinfo()).await?;
        assert!(store.debinfo_by_relic(relic.id).await?.is_some());

        store.mark_all_dirty().await?;
        store.delete_dirty().await?;

        assert!(store.debinfo_by_relic(relic.id).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn debinfo_upsert_updates_in_place() -> Result<()> {
        let store = Store::in_memory().await?;

        let channel = store.upsert_channel("alpha").await?;
        let index = store.upsert_index(channel.id, "stable").await?;
        let relic = store
            .insert_relic(index.id, "hello_1.0_amd64.deb", "1.0", 10)
            .await?;

        store.upsert_debinfo(relic.id, &sample_debinfo()).await?;

        let mut updated = sample_debinfo();
        updated.version = "1.1".to_string();
        store.upsert_debinfo(relic.id, &updated).await?;

        let row = store.debinfo_by_relic(relic.id).await?.unwrap();
        assert_eq!(row.version, "1.1");

        Ok(())
    }

    #[tokio::test]
    async fn filecache_round_trips() -> Result<()> {
        let store = Store::in_memory().await?;

        store
            .filecache_put("alpha-stable-amd64-none", b"data", "1.0", 4, "m", "s1", "s2")
            .await?;

        let row = store
            .filecache_get("alpha-stable-amd64-none")
            .await?
            .expect("cache row should exist");
        assert_eq!(row.value, b"data");
        assert_eq!(row.size, 4);

        store.filecache_delete("alpha-stable-amd64-none").await?;
        assert!(store.filecache_get("alpha-stable-amd64-none").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn arch_substring_query_over_selects() -> Result<()> {
        let store = Store::in_memory().await?;

        let channel = store.upsert_channel("alpha").await?;
        let index = store.upsert_index(channel.id, "stable").await?;

        for (name, arch) in [
            ("one_1.0_amd64.deb", "amd64"),
            ("two_1.0_all.deb", "all"),
            ("three_1.0_i386.deb", "amd64 i386"),
        ] {
            let relic = store.insert_relic(index.id, name, "1.0", 10).await?;
            let mut info = sample_debinfo();
            info.package = name.split('_').next().unwrap().to_string();
            info.architecture = arch.to_string();
            store.upsert_debinfo(relic.id, &info).await?;
        }

        // Substring match picks up the multi-arch row; exact membership is
        // the caller's post-filter.
        let rows = store.package_paragraph_rows(index.id, "amd64").await?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].package, "one");
        assert_eq!(rows[1].package, "three");

        Ok(())
    }
}
