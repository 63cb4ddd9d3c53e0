// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Operator-driven restore of archived records into the hot tier
//!
//! Restores upsert by id and never delete the cold copy, so running a
//! restore twice leaves both tiers unchanged the second time.

use crate::Result;
use crate::archive::ArchivedObject;
use crate::codec::Compression;
use crate::cold::{ColdObject, ColdStore};
use crate::config::TieringConfig;
use crate::error::{Tier, TieringError};
use crate::hot::HotStore;
use crate::naming::ObjectName;
use crate::record::Record;
use crate::report::{RecordFailure, Stage};
use crate::retry::OperationPolicy;
use diagnostics::*;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    pub failed: Vec<RecordFailure>,
}

impl RestoreReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    Restored(String),
    /// Listed object that is gone, or that a more preferred object supersedes
    Skipped,
    Failed(RecordFailure),
}

enum Target {
    Id(String),
    Listed(ObjectName),
}

pub struct Restorer {
    hot: Arc<dyn HotStore>,
    cold: Arc<dyn ColdStore>,
    compression: Compression,
    workers: usize,
    verify_checksums: bool,
    policy: OperationPolicy,
}

impl Restorer {
    #[must_use]
    pub fn new(hot: Arc<dyn HotStore>, cold: Arc<dyn ColdStore>, config: &TieringConfig) -> Self {
        Self {
            hot,
            cold,
            compression: config.cold.compression,
            workers: config.archival.workers.max(1),
            verify_checksums: config.restore.verify_checksums,
            policy: OperationPolicy::new(&config.operations),
        }
    }

    /// Restore one record, or every archived record when `filter` is `None`
    ///
    /// An id archived under more than one codec is restored once, from the
    /// object of the most preferred codec. The full restore streams the cold
    /// listing and keeps no per-id state; a listed object is passed over when
    /// a more preferred object for the same id exists.
    pub async fn restore(&self, filter: Option<&str>) -> Result<RestoreReport> {
        let work: BoxStream<'_, Result<Target>> = match filter {
            Some(id) => {
                crate::record::validate_record_id(id)?;
                stream::iter([Ok(Target::Id(id.to_string()))]).boxed()
            }
            None => self
                .cold
                .list()
                .try_filter_map(|name| async move {
                    Ok(ObjectName::parse(&name).map(Target::Listed))
                })
                .boxed(),
        };
        info!("restore started for {scope}", scope: filter.unwrap_or("all records"));

        let mut outcomes = work
            .map(|target| async move {
                match target {
                    Ok(Target::Id(id)) => Ok(self.restore_id(id).await),
                    Ok(Target::Listed(name)) => Ok(self.restore_listed(name).await),
                    Err(e) => Err(e),
                }
            })
            .buffer_unordered(self.workers);

        let mut report = RestoreReport::default();
        let mut listing_error: Option<TieringError> = None;
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(Outcome::Restored(id)) => report.restored.push(id),
                Ok(Outcome::Skipped) => {}
                Ok(Outcome::Failed(failure)) => report.failed.push(failure),
                Err(e) => {
                    error!("failed to list cold objects: {error}", error: e.to_string());
                    listing_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = listing_error {
            return Err(e);
        }

        report.restored.sort();
        info!(
            "restore done: {restored} restored, {failed} failed",
            restored: report.restored.len(),
            failed: report.failed.len()
        );
        Ok(report)
    }

    async fn restore_id(&self, id: String) -> Outcome {
        let candidates = match ObjectName::candidates(&id, self.compression) {
            Ok(candidates) => candidates,
            Err(e) => return Outcome::Failed(RecordFailure::new(id, Stage::Locate, e)),
        };
        for name in candidates {
            match self.fetch(&name).await {
                Ok(Some(object)) => return self.restore_object(id, &name, object).await,
                Ok(None) => continue,
                Err(e) => return self.failed(id, Stage::Fetch, e),
            }
        }
        let e = TieringError::NotFound(format!("no archived object for {id}"));
        self.failed(id, Stage::Locate, e)
    }

    async fn restore_listed(&self, name: ObjectName) -> Outcome {
        let id = name.record_id().to_string();
        let candidates = match ObjectName::candidates(&id, self.compression) {
            Ok(candidates) => candidates,
            Err(e) => return Outcome::Failed(RecordFailure::new(id, Stage::Locate, e)),
        };
        for preferred in candidates.iter().take_while(|candidate| **candidate != name) {
            match self.fetch(preferred).await {
                Ok(Some(_)) => {
                    debug!(
                        "{name} is superseded by {preferred}",
                        name: name.to_string(),
                        preferred: preferred.to_string()
                    );
                    return Outcome::Skipped;
                }
                Ok(None) => {}
                Err(e) => return self.failed(id, Stage::Fetch, e),
            }
        }

        match self.fetch(&name).await {
            Ok(Some(object)) => self.restore_object(id, &name, object).await,
            Ok(None) => {
                debug!("{name} vanished before it could be restored", name: name.to_string());
                Outcome::Skipped
            }
            Err(e) => self.failed(id, Stage::Fetch, e),
        }
    }

    /// `None` when the object does not exist
    async fn fetch(&self, name: &ObjectName) -> Result<Option<ColdObject>> {
        let key = name.to_string();
        match self
            .policy
            .run(Tier::Cold, "get", || self.cold.get(&key))
            .await
        {
            Ok(object) => Ok(Some(object)),
            Err(TieringError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn restore_object(&self, id: String, name: &ObjectName, object: ColdObject) -> Outcome {
        let bytes = if self.verify_checksums {
            match ArchivedObject::verify(name, &object) {
                Ok(bytes) => bytes,
                Err(TieringError::MissingChecksum(_)) => {
                    warn!(
                        "restoring {name} without checksum verification: no checksum metadata",
                        name: name.to_string()
                    );
                    match ArchivedObject::decode(name, &object) {
                        Ok(bytes) => bytes,
                        Err(e) => return self.failed(id, Stage::Decode, e),
                    }
                }
                Err(e) => return self.failed(id, Stage::Verify, e),
            }
        } else {
            match ArchivedObject::decode(name, &object) {
                Ok(bytes) => bytes,
                Err(e) => return self.failed(id, Stage::Decode, e),
            }
        };

        let record = match Record::from_slice(&bytes) {
            Ok(record) if record.id() == id => record,
            Ok(record) => {
                let e = TieringError::Validation(format!(
                    "{name} holds record '{}'",
                    record.id()
                ));
                return self.failed(id, Stage::Decode, e);
            }
            Err(e) => return self.failed(id, Stage::Decode, e),
        };

        match self
            .policy
            .run(Tier::Hot, "upsert", || self.hot.upsert(&record))
            .await
        {
            Ok(()) => {
                info!("restored {id} from {name}", id: id.as_str(), name: name.to_string());
                Outcome::Restored(id)
            }
            Err(e) => self.failed(id, Stage::Upsert, e),
        }
    }

    fn failed(&self, id: String, stage: Stage, e: TieringError) -> Outcome {
        error!(
            "failed to restore {id} at {stage}: {error}",
            id: id.as_str(),
            stage: stage.to_string(),
            error: e.to_string()
        );
        Outcome::Failed(RecordFailure::new(id, stage, e))
    }
}
