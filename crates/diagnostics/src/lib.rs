// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Lightweight structured logging shared by the tiering crates.
//!
//! Usage:
//! - Set TIERS_LOG=off (default) - no logs
//! - Set TIERS_LOG=info - sweep progress and summaries
//! - Set TIERS_LOG=debug - per-object diagnostics
//!
//! Binaries may override the environment with [`init_with_level`].

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Environment variable consulted by [`init_diagnostics`]
pub const LOG_ENV: &str = "TIERS_LOG";

/// Verbosity requested for the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    /// Parse a level name; `None` for anything unrecognized
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Some(Self::Off),
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" | "trace" => Some(Self::Debug),
            _ => None,
        }
    }

    fn min_level(self) -> Option<emit::Level> {
        match self {
            Self::Off => None,
            Self::Error => Some(emit::Level::Error),
            Self::Warn => Some(emit::Level::Warn),
            Self::Info => Some(emit::Level::Info),
            Self::Debug => Some(emit::Level::Debug),
        }
    }
}

/// Initialize diagnostics from the TIERS_LOG environment variable
///
/// Safe to call multiple times; only the first call (of this or
/// [`init_with_level`]) takes effect.
pub fn init_diagnostics() {
    let raw = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());
    let level = match LogLevel::parse(&raw) {
        Some(level) => level,
        None => {
            // Bootstrap warning: the emitter is not running yet
            eprintln!("Warning: Unknown {LOG_ENV} value '{raw}', using 'info'");
            LogLevel::Info
        }
    };
    init_with_level(level);
}

/// Initialize diagnostics at an explicit level
pub fn init_with_level(level: LogLevel) {
    INIT.call_once(|| {
        let Some(min) = level.min_level() else {
            return;
        };
        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min))
            .init();

        // The runtime must outlive every emitting task; flushing is best effort
        std::mem::forget(rt);
    });
}

/// Per-object diagnostics (object names, byte counts, retry attempts)
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Operator-facing progress (sweep start, per-record success, summaries)
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Recoverable conditions (missing metadata, retries, already-deleted rows)
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Failures that need an operator, including detected corruption
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

pub use init_diagnostics as init;
