// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian binary package handling.

[reader] walks the outer ar archive of a `.deb` and exposes its members.
[builder] writes minimal `.deb` files and exists mainly so tests can
synthesize packages. This module glues them to the catalog: it hashes a
package file, pulls the `control` paragraph out of `control.tar.*`, and
shapes the result into the record the reindexer stores.
*/

pub mod builder;
pub mod reader;

use {
    crate::{
        control::{ControlParagraph, ControlParagraphReader},
        deb::reader::{BinaryPackageEntry, BinaryPackageReader},
        error::{ReliquaryError, Result},
        store::NewDebInfo,
    },
    digest::Digest,
    md5::Md5,
    sha1::Sha1,
    sha2::{Sha256, Sha512},
    std::{
        ffi::OsStr,
        io::{BufReader, Read},
        path::Path,
    },
};

/// Chunk size for streaming package hashing.
const HASH_CHUNK_SIZE: usize = 65536;

/// Hex digests of a whole `.deb` file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DebDigests {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
}

/// A `.deb` file read from disk: its content digests and the parsed
/// `control` paragraph.
#[derive(Clone, Debug)]
pub struct DebArtifact {
    pub digests: DebDigests,
    pub control: ControlParagraph,
}

/// Stream-hash a package file in fixed-size chunks.
fn hash_deb_file(path: &Path) -> Result<DebDigests> {
    let mut file = std::fs::File::open(path)?;

    let mut md5 = Md5::new();
    let mut sha1 = Sha1::new();
    let mut sha256 = Sha256::new();
    let mut sha512 = Sha512::new();

    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }

        md5.update(&buf[0..read]);
        sha1.update(&buf[0..read]);
        sha256.update(&buf[0..read]);
        sha512.update(&buf[0..read]);
    }

    Ok(DebDigests {
        md5: hex::encode(md5.finalize()),
        sha1: hex::encode(sha1.finalize()),
        sha256: hex::encode(sha256.finalize()),
        sha512: hex::encode(sha512.finalize()),
    })
}

/// Extract the `control` paragraph from a `.deb` archive stream.
pub fn extract_control_paragraph(reader: impl Read) -> Result<ControlParagraph> {
    let mut package = BinaryPackageReader::new(reader);

    while let Some(entry) = package.next_entry() {
        if let BinaryPackageEntry::Control(mut control_tar) = entry? {
            for member in control_tar.entries()? {
                let mut member = member?;

                if member.path()?.file_name() != Some(OsStr::new("control")) {
                    continue;
                }

                let mut raw = String::new();
                member.read_to_string(&mut raw)?;

                let mut paragraphs = ControlParagraphReader::new(std::io::Cursor::new(raw));
                return paragraphs
                    .next()
                    .transpose()?
                    .ok_or(ReliquaryError::ControlFileNotFound);
            }

            return Err(ReliquaryError::ControlFileNotFound);
        }
    }

    Err(ReliquaryError::ControlFileNotFound)
}

/// Read a `.deb` file from disk: digests over the whole file plus the
/// parsed control paragraph.
pub fn read_deb_artifact(path: &Path) -> Result<DebArtifact> {
    let digests = hash_deb_file(path)?;

    let file = std::fs::File::open(path)?;
    let control = extract_control_paragraph(BufReader::new(file))?;

    Ok(DebArtifact { digests, control })
}

fn optional_field(control: &ControlParagraph, name: &str) -> Option<String> {
    control.field_str(name).map(|v| v.to_string())
}

/// Shape a parsed artifact into the catalog record for a relic.
///
/// Fails when one of the mandatory control fields is absent; the relic
/// itself stays cataloged in that case, it just carries no Debian metadata.
pub fn debinfo_record(artifact: &DebArtifact, index: &str, relic_name: &str) -> Result<NewDebInfo> {
    let control = &artifact.control;

    let package = control.required_field_str("Package")?.to_string();
    let version = control.required_field_str("Version")?.to_string();
    let architecture = control.required_field_str("Architecture")?.to_string();
    let maintainer = control.required_field_str("Maintainer")?.to_string();
    let description = control.required_field_str("Description")?.to_string();

    let description_md5 = match control.field_str("Description-md5") {
        Some(value) => value.to_string(),
        None => {
            let mut value = description.clone();
            if !value.ends_with('\n') {
                value.push('\n');
            }
            hex::encode(Md5::digest(value.as_bytes()))
        }
    };

    Ok(NewDebInfo {
        filename: format!("pool/{}/{}", index, relic_name),
        md5sum: artifact.digests.md5.clone(),
        sha1: artifact.digests.sha1.clone(),
        sha256: artifact.digests.sha256.clone(),
        sha512: artifact.digests.sha512.clone(),
        description_md5,
        multi_arch: optional_field(control, "Multi-Arch"),
        package,
        version,
        architecture,
        maintainer,
        description,
        source: optional_field(control, "Source"),
        section: optional_field(control, "Section"),
        priority: optional_field(control, "Priority"),
        essential: optional_field(control, "Essential"),
        depends: optional_field(control, "Depends"),
        recommends: optional_field(control, "Recommends"),
        suggests: optional_field(control, "Suggests"),
        enhances: optional_field(control, "Enhances"),
        pre_depends: optional_field(control, "Pre-Depends"),
        installed_size: optional_field(control, "Installed-Size"),
        homepage: optional_field(control, "Homepage"),
        built_using: optional_field(control, "Built-Using"),
    })
}
