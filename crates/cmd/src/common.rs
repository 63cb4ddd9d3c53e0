// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use diagnostics::*;
use std::path::PathBuf;
use std::sync::Arc;
use tiering::{ColdStore, DuckHotStore, HotStore, ObjectColdStore, RecordFailure, TieringConfig};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "TIERS_CONFIG";

/// Configuration shared by every subcommand
#[derive(Debug, Clone)]
pub struct TierContext {
    pub config: TieringConfig,
}

/// The two tiers, opened once per invocation
#[derive(Clone)]
pub struct Stores {
    pub hot: Arc<dyn HotStore>,
    pub cold: Arc<dyn ColdStore>,
}

impl TierContext {
    #[must_use]
    pub fn new(config: TieringConfig) -> Self {
        Self { config }
    }

    /// Load from an explicit path, then `$TIERS_CONFIG`, then built-in defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = config_path.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        let config = match path {
            Some(path) => {
                let shown = path.display().to_string();
                debug!("loading configuration from {path}", path: shown.as_str());
                TieringConfig::load(&path)
                    .with_context(|| format!("Failed to load configuration {shown}"))?
            }
            None => {
                debug!("no configuration file given, using defaults");
                let config = TieringConfig::default();
                config.validate().with_context(|| {
                    format!("No configuration file given; pass --config or set {CONFIG_ENV}")
                })?;
                config
            }
        };
        Ok(Self::new(config))
    }

    /// Open both tiers, refusing a configuration that could lose archived records
    pub fn open_stores(&self) -> Result<Stores> {
        self.config
            .validate()
            .context("Refusing to open the tiers")?;
        let hot = DuckHotStore::open(&self.config.hot)
            .with_context(|| format!("Failed to open hot tier {}", self.config.hot.path))?;
        let cold = ObjectColdStore::from_config(&self.config.cold)
            .with_context(|| format!("Failed to open cold tier {}", self.config.cold.url))?;
        Ok(Stores {
            hot: Arc::new(hot),
            cold: Arc::new(cold),
        })
    }
}

/// One output line per failure, `id [stage]: message`
pub fn failure_lines(failures: &[RecordFailure]) -> impl Iterator<Item = String> + '_ {
    failures.iter().map(|failure| format!("  {failure}"))
}
