// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Archival sweep: hot → cold with read-back verification before delete
//!
//! Per record the sequence is strictly serialize, digest, compress, put,
//! get, verify, delete. A hot record is only deleted after its cold copy has
//! been fetched back and its digest recomputed. Put overwrites by name and
//! delete is keyed, so a record that fails anywhere simply stays a
//! candidate for the next sweep.

use crate::Result;
use crate::archive::ArchivedObject;
use crate::codec::{CHECKSUM_KEY, Compression};
use crate::cold::ColdStore;
use crate::config::TieringConfig;
use crate::error::{Tier, TieringError};
use crate::hot::{HotStore, Predicate, Scanned, scan};
use crate::record::{Eligibility, Record};
use crate::report::{RecordFailure, Stage};
use crate::retry::OperationPolicy;
use chrono::{DateTime, Utc};
use diagnostics::*;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of one sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveReport {
    /// Records now only in the cold tier
    pub archived: usize,
    /// Candidates that failed the local eligibility re-check
    pub skipped: usize,
    pub errors: Vec<RecordFailure>,
    /// The sweep stopped early on request
    pub cancelled: bool,
}

impl ArchiveReport {
    pub fn error_ids(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|f| f.id.as_str())
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }
}

enum Outcome {
    Archived,
    Skipped,
    Failed(RecordFailure),
}

/// Moves eligible records from the hot tier to the cold tier
///
/// The hot delete is keyed by `(id, partitionKey)`, so a record's partition
/// key must not change while it lives in the hot tier. A delete that matches
/// no row is still counted as archived: the row was removed by someone else,
/// or its partition key changed and the row is left in place.
///
/// Sweeps may overlap. Puts overwrite by name and deletes are keyed, so
/// concurrent sweeps never lose a record, but each report only counts its
/// own outcomes and the same record may be counted by more than one sweep.
pub struct Mover {
    hot: Arc<dyn HotStore>,
    cold: Arc<dyn ColdStore>,
    compression: Compression,
    workers: usize,
    page_size: usize,
    policy: OperationPolicy,
}

impl Mover {
    #[must_use]
    pub fn new(hot: Arc<dyn HotStore>, cold: Arc<dyn ColdStore>, config: &TieringConfig) -> Self {
        Self {
            hot,
            cold,
            compression: config.cold.compression,
            workers: config.archival.workers.max(1),
            page_size: config.archival.page_size.max(1),
            policy: OperationPolicy::new(&config.operations),
        }
    }

    /// Archive everything older than `cutoff` as of now
    pub async fn run(&self, cutoff: Duration) -> Result<ArchiveReport> {
        self.sweep(cutoff, Utc::now(), &CancellationToken::new()).await
    }

    /// One pass over the candidates eligible at `now`
    ///
    /// Cancelling stops new records from starting; records already in flight
    /// finish their put/verify/delete sequence. A failure to enumerate the
    /// hot tier ends the sweep with that error once in-flight work drains.
    pub async fn sweep(
        &self,
        cutoff: Duration,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ArchiveReport> {
        let eligibility = Eligibility::new(cutoff)?;
        let threshold = eligibility.threshold(now);
        info!(
            "archival sweep: moving records older than {threshold} using {compression}",
            threshold: threshold.to_rfc3339(),
            compression: self.compression.to_string()
        );

        let eligibility = &eligibility;
        let mut outcomes = std::pin::pin!(
            scan(
                self.hot.as_ref(),
                Predicate::TimestampBefore(threshold),
                self.page_size,
                &self.policy,
            )
            .take_until(cancel.cancelled())
            .map(|candidate| async move {
                match candidate {
                    Ok(Scanned::Record(record)) => {
                        Ok(self.archive_one(record, eligibility, now).await)
                    }
                    Ok(Scanned::Rejected(failure)) => {
                        error!(
                            "cannot archive {id}: {error}",
                            id: failure.id.as_str(),
                            error: failure.message.as_str()
                        );
                        Ok(Outcome::Failed(failure))
                    }
                    Err(e) => Err(e),
                }
            })
            .buffer_unordered(self.workers)
        );

        let mut report = ArchiveReport::default();
        let mut enumeration_error: Option<TieringError> = None;
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(Outcome::Archived) => report.archived += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Ok(Outcome::Failed(failure)) => report.errors.push(failure),
                Err(e) => {
                    error!("failed to enumerate hot candidates: {error}", error: e.to_string());
                    enumeration_error.get_or_insert(e);
                }
            }
        }
        report.cancelled = cancel.is_cancelled();

        if let Some(e) = enumeration_error {
            return Err(e);
        }

        info!(
            "archival sweep done: {archived} archived, {skipped} skipped, {failed} failed",
            archived: report.archived,
            skipped: report.skipped,
            failed: report.errors.len()
        );
        if report.cancelled {
            warn!("archival sweep cancelled before all candidates were processed");
        }
        Ok(report)
    }

    async fn archive_one(
        &self,
        record: Record,
        eligibility: &Eligibility,
        now: DateTime<Utc>,
    ) -> Outcome {
        let id = record.id().to_string();
        if !eligibility.is_eligible(&record, now) {
            debug!("skipping {id}: not eligible", id: id.as_str());
            return Outcome::Skipped;
        }

        let archived = match ArchivedObject::encode(&record, self.compression) {
            Ok(archived) => archived,
            Err(e) => return self.failed(id, Stage::Upload, e),
        };
        let name = archived.name.to_string();
        let metadata = archived.metadata();

        let put = self
            .policy
            .run(Tier::Cold, "put", || {
                self.cold
                    .put(&name, archived.payload.clone(), metadata.clone())
            })
            .await;
        if let Err(e) = put {
            return self.failed(id, Stage::Upload, e);
        }

        let fetched = match self
            .policy
            .run(Tier::Cold, "get", || self.cold.get(&name))
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => return self.failed(id, Stage::Verify, e),
        };
        let expected = archived.checksum.as_str();
        if let Err(e) = ArchivedObject::verify_against(&archived.name, &fetched, expected) {
            return self.failed(id, Stage::Verify, e);
        }
        let stored = fetched.metadata_value(CHECKSUM_KEY);
        if stored != Some(expected) {
            let e = TieringError::Integrity {
                name: name.clone(),
                expected: expected.to_string(),
                actual: format!("stored metadata {}", stored.unwrap_or("<missing>")),
            };
            return self.failed(id, Stage::Verify, e);
        }

        let deleted = self
            .policy
            .run(Tier::Hot, "delete", || {
                self.hot.delete(&id, record.partition_key())
            })
            .await;
        match deleted {
            Ok(true) => {
                info!("archived {id} as {name}", id: id.as_str(), name: name.as_str());
                Outcome::Archived
            }
            Ok(false) => {
                warn!(
                    "archived {id} as {name}, but no hot row matched its id and partition key",
                    id: id.as_str(),
                    name: name.as_str()
                );
                Outcome::Archived
            }
            Err(e) => self.failed(id, Stage::Delete, e),
        }
    }

    fn failed(&self, id: String, stage: Stage, e: TieringError) -> Outcome {
        error!(
            "failed to archive {id} at {stage}: {error}",
            id: id.as_str(),
            stage: stage.to_string(),
            error: e.to_string()
        );
        Outcome::Failed(RecordFailure::new(id, stage, e))
    }
}
