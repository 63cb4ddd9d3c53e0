// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::common::{Stores, TierContext, failure_lines};
use anyhow::{Context, Result};
use tiering::{AuditReport, Auditor};

/// Verify stored checksums of archived objects, optionally for a single record id
pub async fn audit_command<F>(
    ctx: &TierContext,
    stores: &Stores,
    id: Option<&str>,
    mut handler: F,
) -> Result<AuditReport>
where
    F: FnMut(&str),
{
    let auditor = Auditor::new(stores.cold.clone(), &ctx.config);
    let report = auditor.run(id).await.context("Integrity audit failed")?;

    handler(&format!(
        "verified {}, mismatched {}, missing checksum {}, failed {}",
        report.verified,
        report.mismatched.len(),
        report.missing_checksum.len(),
        report.errors.len()
    ));
    for name in &report.mismatched {
        handler(&format!("  MISMATCH {name}"));
    }
    for name in &report.missing_checksum {
        handler(&format!("  NO CHECKSUM {name}"));
    }
    for line in failure_lines(&report.errors) {
        handler(&line);
    }
    Ok(report)
}
