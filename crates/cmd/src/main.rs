// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use cmd::{
    TierContext, archive_command, audit_command, lookup_command, restore_command, serve_command,
};
use diagnostics::*;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(author, version, about = "Move aging records from the hot tier to verified cold storage", long_about = None)]
#[command(name = "tiers")]
struct Cli {
    /// Configuration file (falls back to $TIERS_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level: off, error, warn, info or debug (overrides $TIERS_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move records older than the cutoff to the cold tier
    Archive {
        /// Override archival.cutoff for this run, e.g. "30 days"
        #[arg(long)]
        cutoff: Option<String>,
    },
    /// Recompute checksums of archived objects
    Audit {
        /// Only audit the object(s) for this record id
        #[arg(long)]
        id: Option<String>,
    },
    /// Copy archived records back into the hot tier
    Restore {
        /// Only restore this record id
        #[arg(long)]
        id: Option<String>,
    },
    /// Print a record from whichever tier holds it
    Lookup {
        /// Record id
        id: String,
    },
    /// Serve GET|POST /api/records
    Serve {
        /// Listen address, overriding server.listen
        #[arg(long)]
        listen: Option<String>,
    },
}

#[tokio::main]
#[allow(clippy::print_stdout)]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.log_level.as_deref() {
        Some(name) => {
            let level = diagnostics::LogLevel::parse(name)
                .ok_or_else(|| anyhow!("Unknown log level '{name}'"))?;
            diagnostics::init_with_level(level);
        }
        None => diagnostics::init(),
    }

    let ctx = TierContext::load(cli.config)?;
    let stores = ctx.open_stores()?;

    // First interrupt stops new work; in-flight records finish
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        _ = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    let print = |line: &str| println!("{line}");

    match cli.command {
        Commands::Archive { cutoff } => {
            let report =
                archive_command(&ctx, &stores, cutoff.as_deref(), &cancel, print).await?;
            if !report.errors.is_empty() {
                bail!("{} record(s) could not be archived", report.errors.len());
            }
        }
        Commands::Audit { id } => {
            let report = audit_command(&ctx, &stores, id.as_deref(), print).await?;
            if !report.is_clean() {
                bail!("Integrity audit found problems");
            }
        }
        Commands::Restore { id } => {
            let report = restore_command(&ctx, &stores, id.as_deref(), print).await?;
            if !report.is_clean() {
                bail!("{} record(s) could not be restored", report.failed.len());
            }
        }
        Commands::Lookup { id } => {
            _ = lookup_command(&ctx, &stores, &id, print).await?;
        }
        Commands::Serve { listen } => {
            serve_command(&ctx, &stores, listen.as_deref(), cancel.clone()).await?;
        }
    }

    Ok(())
}
