// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures: fast configuration and fault-injecting store wrappers

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use futures::stream::BoxStream;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tiering::{
    ColdObject, ColdStore, HotStore, MemoryHotStore, Metadata, ObjectColdStore, Page, Predicate,
    Record, Result, TieringConfig, TieringError, parse_timestamp,
};

pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Defaults with retries short enough for tests
pub fn fast_config() -> TieringConfig {
    let mut config = TieringConfig::default();
    config.operations.max_retries = 1;
    config.operations.min_backoff = Duration::from_millis(1);
    config.operations.max_backoff = Duration::from_millis(2);
    config.operations.timeout = Duration::from_secs(5);
    config.archival.page_size = 2;
    config.archival.workers = 3;
    config
}

pub fn at(ts: &str) -> DateTime<Utc> {
    parse_timestamp(ts).expect("timestamp")
}

pub fn record(id: &str, ts: &str) -> Record {
    Record::from_value(json!({
        "id": id,
        "partitionKey": format!("pk-{id}"),
        "timestamp": ts,
        "amount": 42.5,
        "lines": [{"sku": "A1", "qty": 2}],
    }))
    .expect("record")
}

pub async fn object_names(cold: &dyn ColdStore) -> Vec<String> {
    let mut names: Vec<String> = cold.list().try_collect().await.expect("list");
    names.sort();
    names
}

/// Cold store that counts writes and can corrupt what it hands back
#[derive(Debug)]
pub struct TamperingCold {
    pub inner: ObjectColdStore,
    pub puts: AtomicUsize,
    pub corrupt_reads: AtomicBool,
    pub drop_metadata: AtomicBool,
    /// Names still listed but reported missing on read
    pub vanished: Mutex<Vec<String>>,
}

impl TamperingCold {
    pub fn new(inner: ObjectColdStore) -> Self {
        Self {
            inner,
            puts: AtomicUsize::new(0),
            corrupt_reads: AtomicBool::new(false),
            drop_metadata: AtomicBool::new(false),
            vanished: Mutex::new(Vec::new()),
        }
    }

    /// Keep listing `name` but answer reads as if it was deleted meanwhile
    pub fn vanish(&self, name: &str) {
        self.vanished.lock().expect("lock").push(name.to_string());
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ColdStore for TamperingCold {
    async fn put(&self, name: &str, payload: Bytes, metadata: Metadata) -> Result<()> {
        _ = self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(name, payload, metadata).await
    }

    async fn get(&self, name: &str) -> Result<ColdObject> {
        if self.vanished.lock().expect("lock").iter().any(|n| n == name) {
            return Err(TieringError::NotFound(name.to_string()));
        }
        let mut object = self.inner.get(name).await?;
        if self.corrupt_reads.load(Ordering::SeqCst) {
            object.bytes = flip_last_byte(&object.bytes);
        }
        if self.drop_metadata.load(Ordering::SeqCst) {
            object.metadata.clear();
        }
        Ok(object)
    }

    fn list(&self) -> BoxStream<'_, Result<String>> {
        self.inner.list()
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.inner.delete(name).await
    }
}

pub fn flip_last_byte(bytes: &Bytes) -> Bytes {
    let mut raw = bytes.to_vec();
    if let Some(last) = raw.last_mut() {
        *last ^= 0x01;
    }
    Bytes::from(raw)
}

/// Hot store whose deletes can be made to fail
#[derive(Debug, Clone)]
pub struct FlakyHot {
    pub inner: MemoryHotStore,
    pub fail_deletes: Arc<AtomicBool>,
    pub fail_reads: Arc<AtomicBool>,
    /// Deletes remove the row but report that nothing matched, as when
    /// another sweep got there first
    pub raced_deletes: Arc<AtomicBool>,
}

impl FlakyHot {
    pub fn new(inner: MemoryHotStore) -> Self {
        Self {
            inner,
            fail_deletes: Arc::new(AtomicBool::new(false)),
            fail_reads: Arc::new(AtomicBool::new(false)),
            raced_deletes: Arc::new(AtomicBool::new(false)),
        }
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(TieringError::HotStore(format!("{what}: connection refused")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HotStore for FlakyHot {
    async fn query_page(
        &self,
        predicate: &Predicate,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Page> {
        self.check(&self.fail_reads, "query")?;
        self.inner.query_page(predicate, after, limit).await
    }

    async fn get(&self, id: &str) -> Result<Option<Record>> {
        self.check(&self.fail_reads, "get")?;
        self.inner.get(id).await
    }

    async fn delete(&self, id: &str, partition_key: &str) -> Result<bool> {
        self.check(&self.fail_deletes, "delete")?;
        let deleted = self.inner.delete(id, partition_key).await?;
        Ok(deleted && !self.raced_deletes.load(Ordering::SeqCst))
    }

    async fn upsert(&self, record: &Record) -> Result<()> {
        self.inner.upsert(record).await
    }
}
