// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! .deb file reading. */

use {
    crate::error::{ReliquaryError, Result},
    std::{
        io::Read,
        ops::{Deref, DerefMut},
    },
};

fn member_reader(extension: &str, data: std::io::Cursor<Vec<u8>>) -> Result<Box<dyn Read>> {
    match extension {
        "" => Ok(Box::new(data)),
        ".gz" => Ok(Box::new(libflate::gzip::Decoder::new(data)?)),
        ".xz" => Ok(Box::new(xz2::read::XzDecoder::new(data))),
        ".zst" => Ok(Box::new(zstd::Decoder::new(data)?)),
        _ => Err(ReliquaryError::DebUnknownCompression(extension.to_string())),
    }
}

/// A reader of .deb files.
///
/// A .deb binary package file is an ar archive with 3 entries:
///
/// 1. `debian-binary` holding the version of the binary package format.
/// 2. `control.tar[.<ext>]` holding package metadata.
/// 3. `data.tar[.<ext>]` holding file content.
pub struct BinaryPackageReader<R: Read> {
    archive: ar::Archive<R>,
}

impl<R: Read> BinaryPackageReader<R> {
    /// Construct a new instance from a reader.
    pub fn new(reader: R) -> Self {
        Self {
            archive: ar::Archive::new(reader),
        }
    }

    /// Obtain the next entry from the underlying ar archive, classified by
    /// member name.
    pub fn next_entry(&mut self) -> Option<Result<BinaryPackageEntry>> {
        let entry = self.archive.next_entry()?;

        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e.into())),
        };

        // Member names should be ASCII, so converting to strings is
        // reasonably safe.
        let filename = String::from_utf8_lossy(entry.header().identifier()).to_string();

        let mut data = vec![];
        if let Err(e) = entry.read_to_end(&mut data) {
            return Some(Err(e.into()));
        }
        let data = std::io::Cursor::new(data);

        if filename == "debian-binary" {
            Some(Ok(BinaryPackageEntry::DebianBinary(data)))
        } else if let Some(tail) = filename.strip_prefix("control.tar") {
            match member_reader(tail, data) {
                Ok(reader) => Some(Ok(BinaryPackageEntry::Control(ControlTarReader {
                    archive: tar::Archive::new(reader),
                }))),
                Err(e) => Some(Err(e)),
            }
        } else if filename.strip_prefix("data.tar").is_some() {
            // The payload is never inspected here; hand back the raw bytes.
            Some(Ok(BinaryPackageEntry::Data(data)))
        } else {
            Some(Err(ReliquaryError::DebUnknownBinaryPackageEntry(filename)))
        }
    }
}

/// An entry in a .deb archive.
pub enum BinaryPackageEntry {
    /// The `debian-binary` file.
    DebianBinary(std::io::Cursor<Vec<u8>>),
    /// The `control.tar[.<ext>]` tar archive.
    Control(ControlTarReader),
    /// The raw bytes of the `data.tar[.<ext>]` member.
    Data(std::io::Cursor<Vec<u8>>),
}

/// A reader for `control.tar` files.
pub struct ControlTarReader {
    archive: tar::Archive<Box<dyn Read>>,
}

impl Deref for ControlTarReader {
    type Target = tar::Archive<Box<dyn Read>>;

    fn deref(&self) -> &Self::Target {
        &self.archive
    }
}

impl DerefMut for ControlTarReader {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.archive
    }
}
