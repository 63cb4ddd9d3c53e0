// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Explicit configuration passed into every component constructor
//!
//! Loaded from YAML. Durations are human strings such as `"90 days"` or
//! `"250ms"`.

use crate::Result;
use crate::codec::Compression;
use crate::error::TieringError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const DAY: u64 = 24 * 60 * 60;

/// `hot.path` value selecting an in-memory DuckDB database
pub const IN_MEMORY_HOT: &str = ":memory:";

const MEMORY_SCHEME: &str = "memory:";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TieringConfig {
    pub hot: HotConfig,
    pub cold: ColdConfig,
    pub archival: ArchivalConfig,
    pub operations: OperationConfig,
    pub restore: RestoreConfig,
    pub server: ServerConfig,
}

/// DuckDB database holding the hot tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HotConfig {
    /// Database file, or `:memory:`
    pub path: String,
}

impl Default for HotConfig {
    fn default() -> Self {
        Self {
            path: "./hot.duckdb".to_string(),
        }
    }
}

/// Object store holding the cold tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColdConfig {
    /// Container URL, e.g. `s3://bucket/archive`, `az://container`, `file:///srv/archive`
    ///
    /// There is no default. `memory:///` is only accepted alongside an
    /// in-memory hot tier.
    pub url: String,

    /// Backend options passed to object_store (credentials, region, endpoint)
    pub options: BTreeMap<String, String>,

    /// Codec for newly archived objects
    pub compression: Compression,
}

impl Default for ColdConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            options: BTreeMap::new(),
            compression: Compression::Gzip,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchivalConfig {
    /// Records older than this are moved to the cold tier
    #[serde(with = "human_duration")]
    pub cutoff: Duration,

    /// Records processed concurrently within a sweep
    pub workers: usize,

    /// Candidates fetched from the hot tier per query
    pub page_size: usize,
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            cutoff: Duration::from_secs(90 * DAY),
            workers: 8,
            page_size: 500,
        }
    }
}

/// Timeout and retry applied to each individual store call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationConfig {
    #[serde(with = "human_duration")]
    pub timeout: Duration,
    pub max_retries: usize,
    #[serde(with = "human_duration")]
    pub min_backoff: Duration,
    #[serde(with = "human_duration")]
    pub max_backoff: Duration,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            min_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestoreConfig {
    /// Refuse to restore objects whose stored checksum does not match
    pub verify_checksums: bool,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            verify_checksums: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7071".to_string(),
        }
    }
}

impl TieringConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: TieringConfig = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TieringError::Configuration(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hot.path.trim().is_empty() {
            return Err(TieringError::Configuration(
                "hot.path cannot be empty".to_string(),
            ));
        }
        if self.cold.url.trim().is_empty() {
            return Err(TieringError::Configuration(
                "cold.url must be set".to_string(),
            ));
        }
        if self.cold.url.starts_with(MEMORY_SCHEME) && self.hot.path != IN_MEMORY_HOT {
            return Err(TieringError::Configuration(format!(
                "cold.url '{}' does not outlive the process; it cannot hold records archived from {}",
                self.cold.url, self.hot.path
            )));
        }
        if self.archival.workers == 0 {
            return Err(TieringError::Configuration(
                "archival.workers must be greater than 0".to_string(),
            ));
        }
        if self.archival.page_size == 0 {
            return Err(TieringError::Configuration(
                "archival.page_size must be greater than 0".to_string(),
            ));
        }
        if self.operations.timeout.is_zero() {
            return Err(TieringError::Configuration(
                "operations.timeout must be greater than 0".to_string(),
            ));
        }
        if self.operations.min_backoff > self.operations.max_backoff {
            return Err(TieringError::Configuration(
                "operations.min_backoff exceeds operations.max_backoff".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a human duration such as `"90 days"` or `"1h 30m"`
pub fn parse_human_duration(text: &str) -> Result<Duration> {
    parse_duration::parse(text)
        .map_err(|e| TieringError::Configuration(format!("invalid duration '{text}': {e}")))
}

mod human_duration {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}ms", value.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_human_duration(&text).map_err(serde::de::Error::custom)
    }
}
