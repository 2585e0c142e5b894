// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian repository metadata generation.

Three metadata families are produced for the `dist/` side of a channel:

* `Packages` (optionally gzip or bzip2 compressed) per architecture,
  memoized in the catalog's blob cache under
  `"{channel}-{index}-{arch}-{none|gz|bz2}"` keys. A compressed variant is
  always byte-derived from the same uncompressed content its checksums
  describe: when only the `-none` sibling is cached, the compressed row is
  filled by compressing that sibling rather than regenerating.
* A fixed per-architecture `Release` stanza, computed on demand and never
  cached.
* The per-distribution `Release`, which cross-references the size and
  digests of every `Packages` variant and per-arch `Release` it points at.
*/

use {
    crate::{
        error::Result,
        io::{compress_bytes, digest_bytes, now_text, Compression},
        names::DebianName,
        store::{FileCacheRow, PackageParagraphRow, Store},
    },
    chrono::Utc,
    std::collections::HashSet,
    tracing::debug,
};

/// Date format of the per-distribution `Release` file.
///
/// The day-of-month is absent; this reproduces the format the original
/// repository metadata shipped with.
const RELEASE_DATE_FORMAT: &str = "%a, %b %Y %H:%M:%S +0000";

/// A generated metadata blob plus the attributes the cache records for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetadataBlob {
    pub data: Vec<u8>,
    pub mtime: String,
    pub size: i64,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

impl MetadataBlob {
    fn from_bytes(data: Vec<u8>) -> Self {
        let digests = digest_bytes(&data);

        Self {
            mtime: now_text(),
            size: data.len() as i64,
            md5: digests.md5,
            sha1: digests.sha1,
            sha256: digests.sha256,
            data,
        }
    }

    fn from_cache_row(row: FileCacheRow) -> Self {
        Self {
            data: row.value,
            mtime: row.mtime,
            size: row.size,
            md5: row.md5sum,
            sha1: row.sha1,
            sha256: row.sha256,
        }
    }
}

fn cache_key(channel: &str, index: &str, arch: &str, compression: Compression) -> String {
    format!(
        "{}-{}-{}-{}",
        channel,
        index,
        arch,
        compression.cache_suffix()
    )
}

fn push_field(lines: &mut Vec<String>, name: &str, value: &str) {
    lines.push(format!("{}: {}", name, value));
}

fn push_optional(lines: &mut Vec<String>, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        if !value.is_empty() {
            push_field(lines, name, value);
        }
    }
}

/// Render one `Packages` paragraph in the fixed field order.
fn render_paragraph(row: &PackageParagraphRow) -> String {
    let mut lines = Vec::new();

    push_field(&mut lines, "Package", &row.package);
    push_optional(&mut lines, "Source", &row.source);
    push_field(&mut lines, "Version", &row.version);
    push_optional(&mut lines, "Section", &row.section);
    // Priority rides along only when a Section is present.
    if row.section.as_deref().is_some_and(|s| !s.is_empty()) {
        push_optional(&mut lines, "Priority", &row.priority);
    }
    push_field(&mut lines, "Architecture", &row.architecture);
    push_optional(&mut lines, "Essential", &row.essential);
    push_optional(&mut lines, "Depends", &row.depends);
    push_optional(&mut lines, "Recommends", &row.recommends);
    push_optional(&mut lines, "Suggests", &row.suggests);
    push_optional(&mut lines, "Enhances", &row.enhances);
    push_optional(&mut lines, "Pre-Depends", &row.pre_depends);
    push_optional(&mut lines, "Installed-Size", &row.installed_size);
    push_field(&mut lines, "Maintainer", &row.maintainer);
    push_field(&mut lines, "Description", &row.description);
    push_optional(&mut lines, "Homepage", &row.homepage);
    push_optional(&mut lines, "Built-Using", &row.built_using);
    push_field(&mut lines, "Filename", &row.filename);
    push_field(&mut lines, "Size", &row.relic_size.to_string());
    push_field(&mut lines, "MD5Sum", &row.md5sum);
    push_field(&mut lines, "SHA1", &row.sha1);
    push_field(&mut lines, "SHA256", &row.sha256);
    push_field(&mut lines, "SHA512", &row.sha512);
    push_field(&mut lines, "Description-md5", &row.description_md5);
    push_optional(&mut lines, "Multi-Arch", &row.multi_arch);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Whether the whitespace-split architecture field lists the requested
/// architecture exactly.
///
/// A package with architecture `all` is only selected when `all` itself is
/// requested; the substring pre-filter over-selects and this is the final
/// word.
fn architecture_matches(field: &str, arch: &str) -> bool {
    field
        .to_lowercase()
        .split_whitespace()
        .any(|candidate| candidate.trim() == arch)
}

/// Build the uncompressed `Packages` text for an index/architecture pair.
async fn build_packages_text(store: &Store, index_id: i64, arch: &str) -> Result<Vec<u8>> {
    let rows = store.package_paragraph_rows(index_id, arch).await?;

    let paragraphs = rows
        .iter()
        .filter(|row| architecture_matches(&row.architecture, arch))
        .map(render_paragraph)
        .collect::<Vec<_>>();

    Ok(paragraphs.join("\n").into_bytes())
}

/// Generate (or fetch from cache) the `Packages` blob for an architecture.
///
/// With `force` set, any cached entry for the exact key is dropped and the
/// blob is rebuilt from the catalog. Without `force`, a cached entry is
/// returned as-is; failing that, a requested compressed variant is derived
/// from the cached uncompressed sibling when one exists, preserving the
/// byte relationship between the two cache rows.
pub async fn packages_index(
    store: &Store,
    channel: &str,
    index: &str,
    arch: &str,
    compression: Compression,
    force: bool,
) -> Result<MetadataBlob> {
    let key = cache_key(channel, index, arch, compression);

    if force {
        store.filecache_delete(&key).await?;
    } else {
        if let Some(row) = store.filecache_get(&key).await? {
            return Ok(MetadataBlob::from_cache_row(row));
        }

        if compression != Compression::None {
            let sibling_key = cache_key(channel, index, arch, Compression::None);
            if let Some(sibling) = store.filecache_get(&sibling_key).await? {
                debug!(%key, "deriving compressed package index from cached sibling");

                let data = compress_bytes(&sibling.value, compression).await?;
                let blob = MetadataBlob::from_bytes(data);
                store
                    .filecache_put(
                        &key, &blob.data, &blob.mtime, blob.size, &blob.md5, &blob.sha1,
                        &blob.sha256,
                    )
                    .await?;
                return Ok(blob);
            }
        }
    }

    let indexobj = store
        .index_by_names(channel, index)
        .await?
        .ok_or(crate::ReliquaryError::NotFound)?;

    let text = build_packages_text(store, indexobj.id, arch).await?;
    let data = compress_bytes(&text, compression).await?;
    let blob = MetadataBlob::from_bytes(data);

    store
        .filecache_put(
            &key, &blob.data, &blob.mtime, blob.size, &blob.md5, &blob.sha1, &blob.sha256,
        )
        .await?;

    Ok(blob)
}

/// Generate the fixed per-architecture `Release` stanza.
///
/// Never cached; the digests are computed on demand.
pub fn arch_release(arch: &str) -> MetadataBlob {
    let data = format!(
        "Archive: reliquary\nComponent: main\nOrigin: reliquary\nLabel: reliquary\nArchitecture: {}\n",
        arch
    );

    MetadataBlob::from_bytes(data.into_bytes())
}

/// Enumerate the architectures present in an index.
///
/// Walks the index's relics and collects the architecture component of
/// every name the Debian decoder accepts. The result is unordered; callers
/// needing stable output must sort.
pub async fn unique_architectures(store: &Store, index_id: i64) -> Result<HashSet<String>> {
    let mut arches = HashSet::new();

    for relic in store.relics_of_index(index_id).await? {
        if let Some(parsed) = DebianName::parse(&relic.name) {
            if let Some(arch) = parsed.architecture {
                arches.insert(arch);
            }
        }
    }

    Ok(arches)
}

/// Generate the per-distribution `Release` document.
///
/// Lists, for every enumerated architecture, the digests and sizes of the
/// three `Packages` variants plus the per-arch `Release`, under `MD5Sum:`,
/// `SHA1:` and `SHA256:` sections.
pub async fn distribution_release(store: &Store, channel: &str, index: &str) -> Result<String> {
    let indexobj = store
        .index_by_names(channel, index)
        .await?
        .ok_or(crate::ReliquaryError::NotFound)?;

    let mut arches = unique_architectures(store, indexobj.id)
        .await?
        .into_iter()
        .collect::<Vec<_>>();
    arches.sort();

    let mut out = String::new();
    out.push_str("Suite: stable\n");
    out.push_str("Codename: reliquary\n");
    out.push_str("Origin: reliquary\n");
    out.push_str(&format!("Architectures: {}\n", arches.join(" ")));
    out.push_str("Components: main\n");
    out.push_str(&format!(
        "Date: {}\n",
        Utc::now().format(RELEASE_DATE_FORMAT)
    ));

    struct Entry {
        path: String,
        size: i64,
        md5: String,
        sha1: String,
        sha256: String,
    }

    let mut entries = Vec::new();
    for arch in &arches {
        let variants = [
            ("Packages", Compression::None),
            ("Packages.gz", Compression::Gzip),
            ("Packages.bz2", Compression::Bzip2),
        ];

        for (file, compression) in variants {
            let blob = packages_index(store, channel, index, arch, compression, false).await?;
            entries.push(Entry {
                path: format!("main/binary-{}/{}", arch, file),
                size: blob.size,
                md5: blob.md5,
                sha1: blob.sha1,
                sha256: blob.sha256,
            });
        }

        let release = arch_release(arch);
        entries.push(Entry {
            path: format!("main/binary-{}/Release", arch),
            size: release.size,
            md5: release.md5,
            sha1: release.sha1,
            sha256: release.sha256,
        });
    }

    let sections: [(&str, fn(&Entry) -> &str); 3] = [
        ("MD5Sum:", |e| e.md5.as_str()),
        ("SHA1:", |e| e.sha1.as_str()),
        ("SHA256:", |e| e.sha256.as_str()),
    ];

    for (section, digest) in sections {
        out.push_str(section);
        out.push('\n');

        for entry in &entries {
            out.push_str(&format!(
                " {} {:>15} {}\n",
                digest(entry),
                entry.size,
                entry.path
            ));
        }
    }

    out.push_str("Acquire-By-Hash: no\n");

    Ok(out)
}

/// Regenerate every `Packages` variant for every index in the catalog.
///
/// Invoked at the end of a reindex sweep so the blob cache never serves
/// indices describing relics the sweep removed or changed.
pub async fn pregenerate_deb_indices(store: &Store) -> Result<()> {
    for channel in store.channels().await? {
        for index in store.indices_of_channel(channel.id).await? {
            let mut arches = unique_architectures(store, index.id)
                .await?
                .into_iter()
                .collect::<Vec<_>>();
            arches.sort();

            for arch in arches {
                for compression in [Compression::None, Compression::Gzip, Compression::Bzip2] {
                    packages_index(store, &channel.name, &index.name, &arch, compression, true)
                        .await?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{io::decompress_bytes, store::NewDebInfo},
    };

    async fn seeded_store() -> Result<Store> {
        let store = Store::in_memory().await?;

        let channel = store.upsert_channel("alpha").await?;
        let index = store.upsert_index(channel.id, "stable").await?;

        for (name, arch, section, priority) in [
            ("hello_1.0_amd64.deb", "amd64", Some("utils"), Some("optional")),
            ("tools_2.0_all.deb", "all", None, Some("extra")),
        ] {
            let relic = store.insert_relic(index.id, name, "1.0", 1000).await?;
            let parsed = DebianName::parse(name).unwrap();

            store
                .upsert_debinfo(
                    relic.id,
                    &NewDebInfo {
                        filename: format!("pool/stable/{}", name),
                        md5sum: "a".repeat(32),
                        sha1: "b".repeat(40),
                        sha256: "c".repeat(64),
                        sha512: "d".repeat(128),
                        description_md5: "e".repeat(32),
                        package: parsed.package.clone(),
                        version: parsed.version.clone(),
                        architecture: arch.to_string(),
                        maintainer: "Someone <someone@example.com>".to_string(),
                        description: format!("the {} package", parsed.package),
                        section: section.map(|s| s.to_string()),
                        priority: priority.map(|s| s.to_string()),
                        ..Default::default()
                    },
                )
                .await?;
        }

        Ok(store)
    }

    #[tokio::test]
    async fn packages_field_order_is_fixed() -> Result<()> {
        let store = seeded_store().await?;

        let blob =
            packages_index(&store, "alpha", "stable", "amd64", Compression::None, false).await?;
        let text = String::from_utf8(blob.data.clone()).unwrap();

        let expected_prefix = "Package: hello\nVersion: 1.0\nSection: utils\nPriority: optional\nArchitecture: amd64\n";
        assert!(text.starts_with(expected_prefix), "got: {}", text);
        assert!(text.contains("\nFilename: pool/stable/hello_1.0_amd64.deb\n"));
        assert!(text.contains("\nSize: 1000\n"));
        assert!(text.contains("\nSHA512: "));

        Ok(())
    }

    #[tokio::test]
    async fn all_packages_are_excluded_from_concrete_arch() -> Result<()> {
        let store = seeded_store().await?;

        let blob =
            packages_index(&store, "alpha", "stable", "amd64", Compression::None, false).await?;
        let text = String::from_utf8(blob.data).unwrap();
        assert!(text.contains("Package: hello"));
        assert!(!text.contains("Package: tools"));

        let blob =
            packages_index(&store, "alpha", "stable", "all", Compression::None, true).await?;
        let text = String::from_utf8(blob.data).unwrap();
        assert!(text.contains("Package: tools"));
        assert!(!text.contains("Package: hello"));

        Ok(())
    }

    #[tokio::test]
    async fn priority_is_omitted_without_section() -> Result<()> {
        let store = seeded_store().await?;

        // The "tools" row has a priority but no section, so the priority
        // line disappears.
        let blob =
            packages_index(&store, "alpha", "stable", "all", Compression::None, false).await?;
        let text = String::from_utf8(blob.data).unwrap();

        assert!(text.contains("Package: tools"));
        assert!(!text.contains("Priority: extra"));

        Ok(())
    }

    #[tokio::test]
    async fn compressed_variant_derives_from_cached_sibling() -> Result<()> {
        let store = seeded_store().await?;

        let plain =
            packages_index(&store, "alpha", "stable", "amd64", Compression::None, false).await?;
        let gz =
            packages_index(&store, "alpha", "stable", "amd64", Compression::Gzip, false).await?;

        let restored = decompress_bytes(&gz.data, Compression::Gzip).await?;
        assert_eq!(restored, plain.data);

        // The cache rows agree with the blobs they were filled from.
        let row = store
            .filecache_get("alpha-stable-amd64-gz")
            .await?
            .expect("gz cache row should exist");
        assert_eq!(row.value, gz.data);
        assert_eq!(row.sha256, digest_bytes(&gz.data).sha256);

        let sibling = store
            .filecache_get("alpha-stable-amd64-none")
            .await?
            .expect("none cache row should exist");
        assert_eq!(sibling.value, plain.data);

        Ok(())
    }

    #[tokio::test]
    async fn force_refresh_replaces_cache_entry() -> Result<()> {
        let store = seeded_store().await?;

        let first =
            packages_index(&store, "alpha", "stable", "amd64", Compression::None, false).await?;

        // Poison the cache; a forced request must not serve it.
        store
            .filecache_put("alpha-stable-amd64-none", b"stale", "0", 5, "x", "y", "z")
            .await?;

        let cached =
            packages_index(&store, "alpha", "stable", "amd64", Compression::None, false).await?;
        assert_eq!(cached.data, b"stale");

        let forced =
            packages_index(&store, "alpha", "stable", "amd64", Compression::None, true).await?;
        assert_eq!(forced.data, first.data);

        Ok(())
    }

    #[tokio::test]
    async fn distribution_release_lists_every_variant() -> Result<()> {
        let store = seeded_store().await?;

        let release = distribution_release(&store, "alpha", "stable").await?;

        assert!(release.starts_with("Suite: stable\nCodename: reliquary\nOrigin: reliquary\n"));
        assert!(release.contains("Architectures: all amd64\n"));
        assert!(release.contains("Components: main\n"));
        assert!(release.ends_with("Acquire-By-Hash: no\n"));

        for section in ["MD5Sum:\n", "SHA1:\n", "SHA256:\n"] {
            assert!(release.contains(section));
        }

        // Two architectures times four files per digest section.
        for arch in ["all", "amd64"] {
            for file in ["Packages", "Packages.gz", "Packages.bz2", "Release"] {
                let needle = format!("main/binary-{}/{}\n", arch, file);
                assert_eq!(
                    release.matches(&needle).count(),
                    3,
                    "{} should appear once per digest section",
                    needle
                );
            }
        }

        Ok(())
    }

    #[tokio::test]
    async fn arch_release_is_five_fixed_lines() {
        let blob = arch_release("amd64");
        let text = String::from_utf8(blob.data).unwrap();

        assert_eq!(
            text,
            "Archive: reliquary\nComponent: main\nOrigin: reliquary\nLabel: reliquary\nArchitecture: amd64\n"
        );
    }

    #[tokio::test]
    async fn architecture_enumeration_skips_foreign_names() -> Result<()> {
        let store = seeded_store().await?;
        let index = store.index_by_names("alpha", "stable").await?.unwrap();

        // Non-Debian relics and arch-less Debian artifacts contribute
        // nothing.
        store
            .insert_relic(index.id, "left-pad-1.3.0.tgz", "1.0", 10)
            .await?;
        store
            .insert_relic(index.id, "hello_2.10.orig.tar.gz", "1.0", 10)
            .await?;

        let arches = unique_architectures(&store, index.id).await?;
        let mut sorted = arches.into_iter().collect::<Vec<_>>();
        sorted.sort();
        assert_eq!(sorted, vec!["all", "amd64"]);

        Ok(())
    }
}
