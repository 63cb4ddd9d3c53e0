// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Schema-free records with the fields the tiering protocol depends on

use crate::Result;
use crate::error::TieringError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

pub const ID_FIELD: &str = "id";
pub const PARTITION_KEY_FIELD: &str = "partitionKey";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// A JSON object carrying at least string `id` and `partitionKey` fields
///
/// `partitionKey` must not change while the record is hot: the mover deletes
/// by `(id, partitionKey)` after the cold copy is verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Wrap a JSON value, checking the mandatory fields
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(TieringError::Validation(
                "record must be a JSON object".to_string(),
            ));
        };
        let record = Self { fields };
        validate_record_id(record.string_field(ID_FIELD).unwrap_or_default())?;
        if record.string_field(PARTITION_KEY_FIELD).is_none() {
            return Err(TieringError::Validation(format!(
                "record {} has no string '{PARTITION_KEY_FIELD}' field",
                record.id()
            )));
        }
        Ok(record)
    }

    /// Deserialize from canonical bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// Canonical byte form: compact JSON of the field map
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.fields)?)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.string_field(ID_FIELD).unwrap_or_default()
    }

    #[must_use]
    pub fn partition_key(&self) -> &str {
        self.string_field(PARTITION_KEY_FIELD).unwrap_or_default()
    }

    /// The eligibility timestamp, if present and parseable
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.string_field(TIMESTAMP_FIELD).and_then(parse_timestamp)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn string_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

impl TryFrom<Value> for Record {
    type Error = TieringError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.fields)
    }
}

/// Check that an id can name exactly one cold object
pub fn validate_record_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(TieringError::Validation(format!(
            "record has no string '{ID_FIELD}' field"
        )));
    }
    if id == "." || id == ".." {
        return Err(TieringError::Validation(format!("invalid record id '{id}'")));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '?' | '#') || c.is_control())
    {
        return Err(TieringError::Validation(format!(
            "record id '{}' contains illegal character {bad:?}",
            id.escape_debug()
        )));
    }
    Ok(())
}

/// Parse RFC 3339, treating offset-less timestamps as UTC
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Age threshold a record must exceed before it may move to the cold tier
#[derive(Debug, Clone, Copy)]
pub struct Eligibility {
    cutoff: chrono::Duration,
}

impl Eligibility {
    pub fn new(cutoff: Duration) -> Result<Self> {
        let cutoff = chrono::Duration::from_std(cutoff).map_err(|e| {
            TieringError::Configuration(format!("cutoff {cutoff:?} out of range: {e}"))
        })?;
        Ok(Self { cutoff })
    }

    /// Records strictly older than this instant are eligible
    #[must_use]
    pub fn threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.cutoff
    }

    /// `now - timestamp > cutoff`; records without a timestamp are never eligible
    #[must_use]
    pub fn is_eligible(&self, record: &Record, now: DateTime<Utc>) -> bool {
        record
            .timestamp()
            .is_some_and(|ts| now.signed_duration_since(ts) > self.cutoff)
    }
}
