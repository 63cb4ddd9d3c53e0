// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

mod common;

use anyhow::Result;
use bytes::Bytes;
use common::*;
use std::sync::Arc;
use tiering::{
    Auditor, CHECKSUM_KEY, ColdStore, Compression, MemoryHotStore, Metadata, Mover,
    ObjectColdStore,
};
use tokio_util::sync::CancellationToken;

async fn archived_store(ids: &[&str]) -> Result<(MemoryHotStore, ObjectColdStore)> {
    let hot =
        MemoryHotStore::with_records(ids.iter().map(|id| record(id, "2023-01-01T00:00:00Z")))
            .await;
    let cold = ObjectColdStore::in_memory();
    let mover = Mover::new(Arc::new(hot.clone()), Arc::new(cold.clone()), &fast_config());
    let report = mover
        .sweep(90 * DAY, at("2024-01-01T00:00:00Z"), &CancellationToken::new())
        .await?;
    assert_eq!(report.archived, ids.len());
    Ok((hot, cold))
}

#[tokio::test]
async fn test_bit_flip_is_reported_as_mismatch() -> Result<()> {
    let (hot, cold) = archived_store(&["acct-1", "acct-2", "acct-3"]).await?;

    let object = cold.get("acct-2.json.gz").await?;
    cold.put(
        "acct-2.json.gz",
        flip_last_byte(&object.bytes),
        object.metadata.clone(),
    )
    .await?;

    let auditor = Auditor::new(Arc::new(cold.clone()), &fast_config());
    let report = auditor.run(None).await?;
    assert_eq!(report.verified, 2);
    assert_eq!(report.mismatched, vec!["acct-2.json.gz"]);
    assert!(!report.is_clean());

    // the audit repairs nothing and never touches the hot tier
    assert_eq!(object_names(&cold).await.len(), 3);
    assert!(hot.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn test_valid_payload_with_wrong_digest_is_mismatch() -> Result<()> {
    let (_, cold) = archived_store(&["acct-1"]).await?;

    let object = cold.get("acct-1.json.gz").await?;
    let mut altered: serde_json::Value =
        serde_json::from_slice(&Compression::Gzip.decompress(&object.bytes)?)?;
    altered["amount"] = serde_json::json!(9999);
    let payload = Compression::Gzip.compress(&serde_json::to_vec(&altered)?)?;
    cold.put("acct-1.json.gz", Bytes::from(payload), object.metadata.clone())
        .await?;

    let report = Auditor::new(Arc::new(cold), &fast_config())
        .run(None)
        .await?;
    assert_eq!(report.verified, 0);
    assert_eq!(report.mismatched, vec!["acct-1.json.gz"]);
    Ok(())
}

#[tokio::test]
async fn test_missing_checksum_is_flagged_not_mismatched() -> Result<()> {
    let (_, cold) = archived_store(&["acct-1"]).await?;
    let object = cold.get("acct-1.json.gz").await?;
    cold.put("acct-1.json.gz", object.bytes.clone(), Metadata::new())
        .await?;

    let report = Auditor::new(Arc::new(cold), &fast_config())
        .run(None)
        .await?;
    assert_eq!(report.missing_checksum, vec!["acct-1.json.gz"]);
    assert!(report.mismatched.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_uppercase_digest_still_verifies() -> Result<()> {
    let (_, cold) = archived_store(&["acct-1"]).await?;
    let object = cold.get("acct-1.json.gz").await?;
    let mut metadata = object.metadata.clone();
    let upper = metadata
        .get(CHECKSUM_KEY)
        .map(|v| v.to_ascii_uppercase())
        .unwrap_or_default();
    _ = metadata.insert(CHECKSUM_KEY.to_string(), upper);
    cold.put("acct-1.json.gz", object.bytes.clone(), metadata)
        .await?;

    let report = Auditor::new(Arc::new(cold), &fast_config())
        .run(Some("acct-1"))
        .await?;
    assert_eq!(report.verified, 1);
    Ok(())
}

#[tokio::test]
async fn test_filtered_audit_only_reads_named_object() -> Result<()> {
    let (_, cold) = archived_store(&["acct-1", "acct-2"]).await?;
    let object = cold.get("acct-2.json.gz").await?;
    cold.put(
        "acct-2.json.gz",
        flip_last_byte(&object.bytes),
        object.metadata.clone(),
    )
    .await?;

    let auditor = Auditor::new(Arc::new(cold), &fast_config());
    let report = auditor.run(Some("acct-1")).await?;
    assert_eq!(report.verified, 1);
    assert!(report.is_clean());

    let report = auditor.run(Some("acct-2")).await?;
    assert_eq!(report.mismatched, vec!["acct-2.json.gz"]);
    Ok(())
}

#[tokio::test]
async fn test_local_filesystem_cold_tier() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = fast_config();
    config.cold.url = format!("file://{}", dir.path().display());
    let cold = ObjectColdStore::from_config(&config.cold)?;

    let hot = MemoryHotStore::with_records([record("acct-1", "2023-01-01T00:00:00Z")]).await;
    let mover = Mover::new(Arc::new(hot.clone()), Arc::new(cold.clone()), &config);
    let report = mover
        .sweep(90 * DAY, at("2024-01-01T00:00:00Z"), &CancellationToken::new())
        .await?;
    assert_eq!(report.archived, 1);
    assert!(dir.path().join("acct-1.json.gz").exists());
    assert!(dir.path().join("acct-1.json.gz.meta").exists());

    // the sidecar is not an archival object
    let report = Auditor::new(Arc::new(cold), &config).run(None).await?;
    assert_eq!(report.verified, 1);
    assert!(report.is_clean());
    Ok(())
}

#[tokio::test]
async fn test_object_vanishing_after_listing_is_skipped() -> Result<()> {
    let (_, cold) = archived_store(&["acct-1", "acct-2"]).await?;
    let cold = TamperingCold::new(cold);
    cold.vanish("acct-1.json.gz");

    let report = Auditor::new(Arc::new(cold), &fast_config()).run(None).await?;
    assert_eq!(report.verified, 1);
    assert!(report.is_clean());
    Ok(())
}
