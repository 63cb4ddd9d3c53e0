// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

mod common;

use anyhow::Result;
use common::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tiering::{
    ColdStore, HotStore, Locator, LookupError, MemoryHotStore, Mover, ObjectColdStore, Restorer,
    Stage, Tier,
};
use tokio_util::sync::CancellationToken;

async fn archive_all(hot: &MemoryHotStore, cold: &ObjectColdStore) -> Result<()> {
    let mover = Mover::new(Arc::new(hot.clone()), Arc::new(cold.clone()), &fast_config());
    let report = mover
        .sweep(90 * DAY, at("2024-01-01T00:00:00Z"), &CancellationToken::new())
        .await?;
    assert!(report.is_clean());
    Ok(())
}

#[tokio::test]
async fn test_lookup_is_transparent_to_tier() -> Result<()> {
    let old = record("acct-old", "2023-01-01T00:00:00Z");
    let new = record("acct-new", "2023-12-31T00:00:00Z");
    let hot = MemoryHotStore::with_records([old.clone(), new.clone()]).await;
    let cold = ObjectColdStore::in_memory();
    archive_all(&hot, &cold).await?;

    let locator = Locator::new(Arc::new(hot), Arc::new(cold), &fast_config());
    let found = locator.locate("acct-old").await?;
    assert_eq!(found.tier, Tier::Cold);
    assert_eq!(found.record, old);

    let found = locator.locate("acct-new").await?;
    assert_eq!(found.tier, Tier::Hot);
    assert_eq!(found.record, new);

    assert!(matches!(
        locator.lookup("acct-none").await,
        Err(LookupError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_hot_outage_is_upstream_unavailable() -> Result<()> {
    let hot = FlakyHot::new(MemoryHotStore::new());
    hot.fail_reads.store(true, Ordering::SeqCst);
    let locator = Locator::new(
        Arc::new(hot),
        Arc::new(ObjectColdStore::in_memory()),
        &fast_config(),
    );
    assert!(matches!(
        locator.lookup("acct-1").await,
        Err(LookupError::UpstreamUnavailable(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_restore_twice_is_idempotent() -> Result<()> {
    let records = [
        record("acct-1", "2023-01-01T00:00:00Z"),
        record("acct-2", "2023-02-01T00:00:00Z"),
    ];
    let hot = MemoryHotStore::with_records(records.clone()).await;
    let cold = ObjectColdStore::in_memory();
    archive_all(&hot, &cold).await?;
    assert!(hot.is_empty().await);

    let restorer = Restorer::new(Arc::new(hot.clone()), Arc::new(cold.clone()), &fast_config());
    let first = restorer.restore(None).await?;
    assert_eq!(first.restored, vec!["acct-1", "acct-2"]);
    let second = restorer.restore(None).await?;
    assert_eq!(second.restored, first.restored);

    assert_eq!(hot.len().await, 2);
    for original in &records {
        assert_eq!(hot.get(original.id()).await?.as_ref(), Some(original));
    }
    assert_eq!(object_names(&cold).await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_restore_refuses_corrupted_object() -> Result<()> {
    let hot = MemoryHotStore::with_records([record("acct-1", "2023-01-01T00:00:00Z")]).await;
    let cold = ObjectColdStore::in_memory();
    archive_all(&hot, &cold).await?;

    let object = cold.get("acct-1.json.gz").await?;
    cold.put(
        "acct-1.json.gz",
        flip_last_byte(&object.bytes),
        object.metadata.clone(),
    )
    .await?;

    let restorer = Restorer::new(Arc::new(hot.clone()), Arc::new(cold.clone()), &fast_config());
    let report = restorer.restore(Some("acct-1")).await?;
    assert!(report.restored.is_empty());
    assert_eq!(report.failed[0].stage, Stage::Verify);
    assert!(hot.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn test_restore_without_verification_trusts_payload() -> Result<()> {
    let acct = record("acct-1", "2023-01-01T00:00:00Z");
    let hot = MemoryHotStore::with_records([acct.clone()]).await;
    let cold = ObjectColdStore::in_memory();
    archive_all(&hot, &cold).await?;

    let object = cold.get("acct-1.json.gz").await?;
    let mut metadata = object.metadata.clone();
    _ = metadata.insert(tiering::CHECKSUM_KEY.to_string(), "0".repeat(64));
    cold.put("acct-1.json.gz", object.bytes.clone(), metadata).await?;

    let mut config = fast_config();
    config.restore.verify_checksums = false;
    let restorer = Restorer::new(Arc::new(hot.clone()), Arc::new(cold), &config);
    let report = restorer.restore(Some("acct-1")).await?;
    assert_eq!(report.restored, vec!["acct-1"]);
    assert_eq!(hot.get("acct-1").await?, Some(acct));
    Ok(())
}

#[tokio::test]
async fn test_restored_record_is_archived_again_by_next_sweep() -> Result<()> {
    let acct = record("acct-1", "2023-01-01T00:00:00Z");
    let hot = MemoryHotStore::with_records([acct]).await;
    let cold = ObjectColdStore::in_memory();
    archive_all(&hot, &cold).await?;

    let restorer = Restorer::new(Arc::new(hot.clone()), Arc::new(cold.clone()), &fast_config());
    _ = restorer.restore(Some("acct-1")).await?;
    assert!(hot.contains("acct-1").await);

    archive_all(&hot, &cold).await?;
    assert!(!hot.contains("acct-1").await);
    assert_eq!(object_names(&cold).await, vec!["acct-1.json.gz"]);
    Ok(())
}

#[tokio::test]
async fn test_restore_skips_objects_that_vanish() -> Result<()> {
    let hot = MemoryHotStore::with_records([
        record("acct-1", "2023-01-01T00:00:00Z"),
        record("acct-2", "2023-01-01T00:00:00Z"),
    ])
    .await;
    let cold = ObjectColdStore::in_memory();
    archive_all(&hot, &cold).await?;
    let cold = TamperingCold::new(cold);
    cold.vanish("acct-1.json.gz");

    let restorer = Restorer::new(Arc::new(hot.clone()), Arc::new(cold), &fast_config());
    let report = restorer.restore(None).await?;
    assert_eq!(report.restored, vec!["acct-2"]);
    assert!(report.is_clean());
    assert!(!hot.contains("acct-1").await);
    assert!(hot.contains("acct-2").await);
    Ok(())
}
