// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! I/O helpers: digesting and metadata blob compression. */

use {
    crate::error::Result,
    async_compression::futures::bufread::{BzDecoder, BzEncoder, GzipDecoder, GzipEncoder},
    digest::Digest,
    futures::{AsyncBufRead, AsyncRead, AsyncReadExt},
    md5::Md5,
    sha1::Sha1,
    sha2::Sha256,
    std::{pin::Pin, time::SystemTime},
};

/// Compression formats used for generated metadata blobs.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Compression {
    /// No compression (no extension).
    None,

    /// Gzip compression (.gz extension).
    Gzip,

    /// Bzip2 compression (.bz2 extension).
    Bzip2,
}

impl Compression {
    /// Filename extension for files compressed in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Bzip2 => ".bz2",
        }
    }

    /// Suffix used in metadata cache keys.
    pub fn cache_suffix(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
        }
    }

    /// Content type served for a blob compressed in this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::None => "text/plain",
            Self::Gzip => "application/gzip",
            Self::Bzip2 => "application/x-bzip2",
        }
    }
}

/// Wrap a reader with transparent compression.
pub fn read_compressed<'a>(
    stream: impl AsyncBufRead + Send + 'a,
    compression: Compression,
) -> Pin<Box<dyn AsyncRead + Send + 'a>> {
    match compression {
        Compression::None => Box::pin(stream),
        Compression::Gzip => Box::pin(GzipEncoder::new(stream)),
        Compression::Bzip2 => Box::pin(BzEncoder::new(stream)),
    }
}

/// Wrap a reader with transparent decompression.
pub fn read_decompressed<'a>(
    stream: impl AsyncBufRead + Send + 'a,
    compression: Compression,
) -> Pin<Box<dyn AsyncRead + Send + 'a>> {
    match compression {
        Compression::None => Box::pin(stream),
        Compression::Gzip => Box::pin(GzipDecoder::new(stream)),
        Compression::Bzip2 => Box::pin(BzDecoder::new(stream)),
    }
}

/// Compress a byte slice in the given format.
pub async fn compress_bytes(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    let mut reader = read_compressed(futures::io::BufReader::new(data), compression);
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await?;
    Ok(out)
}

/// Decompress a byte slice in the given format.
pub async fn decompress_bytes(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    let mut reader = read_decompressed(futures::io::BufReader::new(data), compression);
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await?;
    Ok(out)
}

/// Hex-encoded digests of a single piece of content, in the flavors the
/// catalog records for generated metadata.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContentDigests {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

/// A content digester that simultaneously computes multiple digest types.
pub struct MultiDigester {
    md5: Md5,
    sha1: Sha1,
    sha256: Sha256,
}

impl Default for MultiDigester {
    fn default() -> Self {
        Self {
            md5: Md5::new(),
            sha1: Sha1::new(),
            sha256: Sha256::new(),
        }
    }
}

impl MultiDigester {
    /// Write content into the digesters.
    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
        self.sha256.update(data);
    }

    /// Finish digesting content.
    ///
    /// Consumes the instance and returns the resolved hex digests.
    pub fn finish(self) -> ContentDigests {
        ContentDigests {
            md5: hex::encode(self.md5.finalize()),
            sha1: hex::encode(self.sha1.finalize()),
            sha256: hex::encode(self.sha256.finalize()),
        }
    }
}

/// Digest a full in-memory buffer.
pub fn digest_bytes(data: &[u8]) -> ContentDigests {
    let mut digester = MultiDigester::default();
    digester.update(data);
    digester.finish()
}

/// Render a [SystemTime] as the textual float of seconds since the epoch
/// used throughout the catalog.
pub fn mtime_text(time: SystemTime) -> String {
    let secs = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    format!("{}", secs)
}

/// The current time in catalog mtime format.
pub fn now_text() -> String {
    mtime_text(SystemTime::now())
}
