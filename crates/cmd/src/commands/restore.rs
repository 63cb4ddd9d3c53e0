// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::common::{Stores, TierContext, failure_lines};
use anyhow::{Context, Result};
use tiering::{RestoreReport, Restorer};

/// Copy archived records back into the hot tier; cold objects are kept
pub async fn restore_command<F>(
    ctx: &TierContext,
    stores: &Stores,
    id: Option<&str>,
    mut handler: F,
) -> Result<RestoreReport>
where
    F: FnMut(&str),
{
    let restorer = Restorer::new(stores.hot.clone(), stores.cold.clone(), &ctx.config);
    let report = restorer.restore(id).await.context("Restore failed")?;

    handler(&format!(
        "restored {}, failed {}",
        report.restored.len(),
        report.failed.len()
    ));
    for line in failure_lines(&report.failed) {
        handler(&line);
    }
    Ok(report)
}
