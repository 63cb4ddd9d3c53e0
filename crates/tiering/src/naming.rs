// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Deterministic cold-object names: `<record_id>.json.<ext>`
//!
//! Mover, auditor, locator and restorer all go through this type, so the
//! pattern is defined exactly once.

use crate::Result;
use crate::codec::Compression;
use crate::record::validate_record_id;
use std::fmt;

const FORMAT: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName {
    record_id: String,
    compression: Compression,
}

impl ObjectName {
    /// Name for a record archived with the given codec
    pub fn for_record(record_id: &str, compression: Compression) -> Result<Self> {
        validate_record_id(record_id)?;
        Ok(Self {
            record_id: record_id.to_string(),
            compression,
        })
    }

    /// Every name a record could have been archived under, preferred codec first
    pub fn candidates(record_id: &str, preferred: Compression) -> Result<Vec<Self>> {
        preferred
            .preference_order()
            .map(|compression| Self::for_record(record_id, compression))
            .collect()
    }

    /// Recognize an archival object; `None` for anything else in the bucket
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let (stem, ext) = name.rsplit_once('.')?;
        let compression = Compression::from_extension(ext)?;
        let record_id = stem.strip_suffix(FORMAT)?.strip_suffix('.')?;
        Self::for_record(record_id, compression).ok()
    }

    #[must_use]
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{FORMAT}.{}",
            self.record_id,
            self.compression.extension()
        )
    }
}
