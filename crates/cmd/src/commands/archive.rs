// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::common::{Stores, TierContext, failure_lines};
use anyhow::{Context, Result};
use chrono::Utc;
use diagnostics::*;
use tiering::{ArchiveReport, Mover, parse_human_duration};
use tokio_util::sync::CancellationToken;

/// Run one archival sweep
///
/// `cutoff` overrides `archival.cutoff` for this run only.
pub async fn archive_command<F>(
    ctx: &TierContext,
    stores: &Stores,
    cutoff: Option<&str>,
    cancel: &CancellationToken,
    mut handler: F,
) -> Result<ArchiveReport>
where
    F: FnMut(&str),
{
    let cutoff = match cutoff {
        Some(text) => parse_human_duration(text).context("Invalid --cutoff")?,
        None => ctx.config.archival.cutoff,
    };
    debug!("archive_command called with cutoff {cutoff_secs}s", cutoff_secs: cutoff.as_secs());

    let mover = Mover::new(stores.hot.clone(), stores.cold.clone(), &ctx.config);
    let report = mover
        .sweep(cutoff, Utc::now(), cancel)
        .await
        .context("Archival sweep failed")?;

    handler(&format!(
        "archived {}, skipped {}, failed {}{}",
        report.archived,
        report.skipped,
        report.errors.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    ));
    for line in failure_lines(&report.errors) {
        handler(&line);
    }
    Ok(report)
}
