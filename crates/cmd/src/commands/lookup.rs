// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::common::{Stores, TierContext};
use anyhow::Result;
use diagnostics::*;
use tiering::{Located, Locator};

/// Print one record as pretty JSON, wherever it lives
pub async fn lookup_command<F>(
    ctx: &TierContext,
    stores: &Stores,
    id: &str,
    mut handler: F,
) -> Result<Located>
where
    F: FnMut(&str),
{
    let locator = Locator::new(stores.hot.clone(), stores.cold.clone(), &ctx.config);
    let located = locator.locate(id).await?;
    info!("{id} found in {tier} tier", id: id, tier: located.tier.to_string());

    handler(&serde_json::to_string_pretty(&located.record)?);
    Ok(located)
}
