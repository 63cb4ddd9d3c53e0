// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! The cold-tier envelope of a record: compressed canonical bytes plus a
//! `sha256` metadata entry over the uncompressed bytes

use crate::Result;
use crate::codec::{CHECKSUM_KEY, Checksum, Compression};
use crate::cold::{ColdObject, Metadata};
use crate::error::TieringError;
use crate::naming::ObjectName;
use crate::record::Record;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct ArchivedObject {
    pub name: ObjectName,
    pub payload: Bytes,
    pub checksum: Checksum,
}

impl ArchivedObject {
    /// Serialize, digest, then compress
    pub fn encode(record: &Record, compression: Compression) -> Result<Self> {
        let name = ObjectName::for_record(record.id(), compression)?;
        let canonical = record.to_canonical_bytes()?;
        let checksum = Checksum::of(&canonical);
        let payload = Bytes::from(compression.compress(&canonical)?);
        Ok(Self {
            name,
            payload,
            checksum,
        })
    }

    #[must_use]
    pub fn metadata(&self) -> Metadata {
        Metadata::from([(CHECKSUM_KEY.to_string(), self.checksum.to_string())])
    }

    /// Decompress a fetched object without checking its digest
    pub fn decode(name: &ObjectName, object: &ColdObject) -> Result<Vec<u8>> {
        Ok(name.compression().decompress(&object.bytes)?)
    }

    /// Check a fetched object against the digest stored in its own metadata
    ///
    /// Returns the canonical bytes on success. A missing entry is
    /// [`TieringError::MissingChecksum`]; a wrong digest or an undecodable
    /// payload is [`TieringError::Integrity`].
    pub fn verify(name: &ObjectName, object: &ColdObject) -> Result<Vec<u8>> {
        let stored = object
            .metadata_value(CHECKSUM_KEY)
            .ok_or_else(|| TieringError::MissingChecksum(name.to_string()))?;
        Self::verify_against(name, object, stored)
    }

    /// Check a fetched object against an expected digest
    pub fn verify_against(
        name: &ObjectName,
        object: &ColdObject,
        expected: &str,
    ) -> Result<Vec<u8>> {
        let canonical = match Self::decode(name, object) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Err(TieringError::Integrity {
                    name: name.to_string(),
                    expected: expected.to_string(),
                    actual: format!("undecodable payload ({e})"),
                });
            }
        };
        let actual = Checksum::of(&canonical);
        match Checksum::parse(expected) {
            Some(expected) if expected == actual => Ok(canonical),
            _ => Err(TieringError::Integrity {
                name: name.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            }),
        }
    }
}
