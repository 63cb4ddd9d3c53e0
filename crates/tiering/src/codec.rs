// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Checksum and compression codecs
//!
//! The checksum is always taken over the *uncompressed* canonical bytes, so
//! an object can be verified regardless of which compression wrote it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{Read, Write};

/// Object metadata key holding the checksum
pub const CHECKSUM_KEY: &str = "sha256";

/// Lowercase hex SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum(String);

impl Checksum {
    /// Digest a payload
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    /// Accept a stored digest, normalizing case; `None` if it is not 64 hex digits
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(value.to_ascii_lowercase()))
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reversible compression applied before cold storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Gzip,
    Zstd,
}

const ZSTD_LEVEL: i32 = 3;

impl Compression {
    /// Every codec, in a stable order
    pub const ALL: [Compression; 2] = [Compression::Gzip, Compression::Zstd];

    /// File extension used in object names
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            Compression::Zstd => "zst",
        }
    }

    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.extension() == ext)
    }

    /// `self` first, then the remaining codecs
    pub fn preference_order(self) -> impl Iterator<Item = Compression> {
        std::iter::once(self).chain(Self::ALL.into_iter().filter(move |c| *c != self))
    }

    pub fn compress(self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Compression::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Compression::Zstd => zstd::encode_all(data, ZSTD_LEVEL),
        }
    }

    /// Decompress a payload; truncated or corrupted input is an error
    pub fn decompress(self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Compression::Gzip => {
                let mut decoder = flate2::read::GzDecoder::new(data);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            Compression::Zstd => zstd::decode_all(data),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::Gzip => f.write_str("gzip"),
            Compression::Zstd => f.write_str("zstd"),
        }
    }
}
