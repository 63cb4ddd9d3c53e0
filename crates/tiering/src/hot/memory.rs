// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::{HotStore, Page, Predicate};
use crate::Result;
use crate::record::Record;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory hot tier for tests and local experiments
#[derive(Debug, Clone, Default)]
pub struct MemoryHotStore {
    records: Arc<Mutex<BTreeMap<String, Record>>>,
}

impl MemoryHotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `records`
    pub async fn with_records<I: IntoIterator<Item = Record>>(records: I) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.lock().await;
            for record in records {
                _ = map.insert(record.id().to_string(), record);
            }
        }
        store
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.records.lock().await.contains_key(id)
    }
}

#[async_trait]
impl HotStore for MemoryHotStore {
    async fn query_page(
        &self,
        predicate: &Predicate,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Page> {
        let records = self.records.lock().await;
        let lower = match after {
            Some(id) => Bound::Excluded(id.to_string()),
            None => Bound::Unbounded,
        };
        let page: Vec<Record> = records
            .range((lower, Bound::Unbounded))
            .map(|(_, record)| record)
            .filter(|record| predicate.matches(record))
            .take(limit)
            .cloned()
            .collect();
        Ok(Page::from_records(page, limit))
    }

    async fn get(&self, id: &str) -> Result<Option<Record>> {
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn delete(&self, id: &str, partition_key: &str) -> Result<bool> {
        let mut records = self.records.lock().await;
        match records.get(id) {
            Some(record) if record.partition_key() == partition_key => {
                _ = records.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn upsert(&self, record: &Record) -> Result<()> {
        _ = self
            .records
            .lock()
            .await
            .insert(record.id().to_string(), record.clone());
        Ok(())
    }
}
