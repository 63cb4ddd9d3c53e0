// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::common::{Stores, TierContext};
use crate::http;
use anyhow::{Context, Result};
use diagnostics::*;
use std::sync::Arc;
use tiering::Locator;
use tokio_util::sync::CancellationToken;

/// Serve the retrieval endpoint until `cancel` fires
pub async fn serve_command(
    ctx: &TierContext,
    stores: &Stores,
    listen: Option<&str>,
    cancel: CancellationToken,
) -> Result<()> {
    let listen = listen.unwrap_or(&ctx.config.server.listen);
    let locator = Arc::new(Locator::new(
        stores.hot.clone(),
        stores.cold.clone(),
        &ctx.config,
    ));

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;
    info!("serving /api/records on {listen}", listen: listen);

    axum::serve(listener, http::router(locator))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("HTTP server failed")?;

    info!("server stopped");
    Ok(())
}
