// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Hot tier: the low-latency record database

use crate::Result;
use crate::error::Tier;
use crate::record::Record;
use crate::report::{RecordFailure, Stage};
use crate::retry::OperationPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;

mod duck;
mod memory;

pub use duck::DuckHotStore;
pub use memory::MemoryHotStore;

/// Parameterized selection over hot records
///
/// Backends translate this into their own query language with bound
/// parameters; [`Predicate::matches`] is the reference semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    IdEquals(String),
    /// Records whose parsed timestamp is strictly before the instant
    TimestampBefore(DateTime<Utc>),
    And(Vec<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::IdEquals(id) => record.id() == id,
            Predicate::TimestampBefore(instant) => {
                record.timestamp().is_some_and(|ts| ts < *instant)
            }
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record)),
        }
    }
}

/// One page of a keyset-paginated query, ordered by id
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Record>,
    /// Rows on this page whose stored body is not a valid record
    pub rejected: Vec<RecordFailure>,
    /// Cursor for the following page; `None` when this was the last one
    pub next: Option<String>,
}

impl Page {
    /// Build a page from up to `limit` id-ordered records
    #[must_use]
    pub fn from_records(records: Vec<Record>, limit: usize) -> Self {
        let next = if records.len() >= limit {
            records.last().map(|r| r.id().to_string())
        } else {
            None
        };
        Self {
            records,
            rejected: Vec::new(),
            next,
        }
    }

    /// Build a page from up to `limit` id-ordered `(id, body)` rows
    ///
    /// Each body is decoded on its own; a bad row is rejected without
    /// affecting its neighbours, and the cursor advances past it.
    #[must_use]
    pub fn from_rows(rows: Vec<(String, String)>, limit: usize) -> Self {
        let next = if rows.len() >= limit {
            rows.last().map(|(id, _)| id.clone())
        } else {
            None
        };
        let mut page = Self {
            next,
            ..Self::default()
        };
        for (id, body) in rows {
            match Record::from_slice(body.as_bytes()) {
                Ok(record) if record.id() == id => page.records.push(record),
                Ok(record) => page.rejected.push(RecordFailure::new(
                    id,
                    Stage::Decode,
                    format!("stored body holds record '{}'", record.id()),
                )),
                Err(e) => page.rejected.push(RecordFailure::new(id, Stage::Decode, e)),
            }
        }
        page
    }
}

/// One row produced by [`scan`]
#[derive(Debug, Clone)]
pub enum Scanned {
    Record(Record),
    /// A row that could not be decoded into a record
    Rejected(RecordFailure),
}

#[async_trait]
pub trait HotStore: Send + Sync {
    /// Records matching `predicate` with id greater than `after`, ascending by id
    async fn query_page(
        &self,
        predicate: &Predicate,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Page>;

    async fn get(&self, id: &str) -> Result<Option<Record>>;

    /// Delete by `(id, partitionKey)`; `false` when no row matched
    async fn delete(&self, id: &str, partition_key: &str) -> Result<bool>;

    /// Insert, or replace the record with the same id
    async fn upsert(&self, record: &Record) -> Result<()>;
}

/// Lazily enumerate every row matching `predicate`, one page at a time
///
/// Pages are keyed on the last id seen, so rows deleted behind the cursor
/// never shift later pages. Undecodable rows are yielded as
/// [`Scanned::Rejected`] and do not end the scan.
pub fn scan<'a>(
    store: &'a dyn HotStore,
    predicate: Predicate,
    page_size: usize,
    policy: &'a OperationPolicy,
) -> BoxStream<'a, Result<Scanned>> {
    let stream = async_stream::try_stream! {
        let mut cursor: Option<String> = None;
        loop {
            let page = policy
                .run(Tier::Hot, "query", || {
                    store.query_page(&predicate, cursor.as_deref(), page_size)
                })
                .await?;
            for failure in page.rejected {
                yield Scanned::Rejected(failure);
            }
            for record in page.records {
                yield Scanned::Record(record);
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
    };
    stream.boxed()
}
