// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for tiering operations

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which tier an operation talked to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Cold,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Hot => f.write_str("hot"),
            Tier::Cold => f.write_str("cold"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TieringError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{tier} store operation '{operation}' timed out after {elapsed:?}")]
    Timeout {
        tier: Tier,
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("Hot store error: {0}")]
    HotStore(String),

    #[error("Cold store error: {0}")]
    ColdStore(#[source] object_store::Error),

    #[error(
        "Integrity check failed for {name}: expected sha256={expected}, got {actual}"
    )]
    Integrity {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Object {0} has no checksum metadata")]
    MissingChecksum(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Codec error: {0}")]
    Codec(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TieringError {
    /// Whether retrying the same idempotent operation may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            TieringError::Timeout { .. } | TieringError::HotStore(_) => true,
            TieringError::ColdStore(err) => !matches!(
                err,
                object_store::Error::NotFound { .. }
                    | object_store::Error::InvalidPath { .. }
                    | object_store::Error::NotSupported { .. }
                    | object_store::Error::NotImplemented
                    | object_store::Error::UnknownConfigurationKey { .. }
                    | object_store::Error::PermissionDenied { .. }
                    | object_store::Error::Unauthenticated { .. }
            ),
            _ => false,
        }
    }
}

impl From<object_store::Error> for TieringError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => TieringError::NotFound(path),
            other => TieringError::ColdStore(other),
        }
    }
}

impl From<duckdb::Error> for TieringError {
    fn from(err: duckdb::Error) -> Self {
        TieringError::HotStore(err.to_string())
    }
}

impl From<serde_yaml_ng::Error> for TieringError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TieringError::Configuration(err.to_string())
    }
}

impl From<tokio::task::JoinError> for TieringError {
    fn from(err: tokio::task::JoinError) -> Self {
        TieringError::HotStore(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_not_transient() {
        let err = TieringError::from(object_store::Error::NotFound {
            path: "acct-42.json.gz".to_string(),
            source: "missing".into(),
        });
        assert!(matches!(err, TieringError::NotFound(ref p) if p == "acct-42.json.gz"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transport_errors_are_transient() {
        let err = TieringError::from(object_store::Error::Generic {
            store: "S3",
            source: "connection reset".into(),
        });
        assert!(err.is_transient());
        assert!(TieringError::HotStore("socket closed".to_string()).is_transient());
        assert!(
            TieringError::Timeout {
                tier: Tier::Cold,
                operation: "put",
                elapsed: Duration::from_secs(1),
            }
            .is_transient()
        );
    }

    #[test]
    fn test_integrity_is_never_transient() {
        let err = TieringError::Integrity {
            name: "a.json.gz".to_string(),
            expected: "00".to_string(),
            actual: "11".to_string(),
        };
        assert!(!err.is_transient());
        assert!(!TieringError::Validation("no id".to_string()).is_transient());
    }
}
