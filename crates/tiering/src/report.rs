// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::fmt;

/// Step of the per-record pipeline at which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Upload,
    Verify,
    Delete,
    Fetch,
    Decode,
    Upsert,
    Locate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Upload => "upload",
            Stage::Verify => "verify",
            Stage::Delete => "delete",
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Upsert => "upsert",
            Stage::Locate => "locate",
        };
        f.write_str(name)
    }
}

/// One record (or object) that a sweep could not process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub id: String,
    pub stage: Stage,
    pub message: String,
}

impl RecordFailure {
    pub fn new(id: impl Into<String>, stage: Stage, error: impl fmt::Display) -> Self {
        Self {
            id: id.into(),
            stage,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.id, self.stage, self.message)
    }
}
