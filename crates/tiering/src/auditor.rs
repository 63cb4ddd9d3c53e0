// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Integrity audit of the cold tier
//!
//! Read-only. Recomputes the digest of every archival object and compares it
//! with the stored `sha256` metadata. Findings are reported, never repaired.

use crate::Result;
use crate::archive::ArchivedObject;
use crate::codec::Compression;
use crate::cold::ColdStore;
use crate::config::TieringConfig;
use crate::error::{Tier, TieringError};
use crate::naming::ObjectName;
use crate::report::{RecordFailure, Stage};
use crate::retry::OperationPolicy;
use diagnostics::*;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub verified: usize,
    /// Objects whose content does not match their stored digest
    pub mismatched: Vec<String>,
    /// Objects without a digest to check against
    pub missing_checksum: Vec<String>,
    pub errors: Vec<RecordFailure>,
}

impl AuditReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.missing_checksum.is_empty() && self.errors.is_empty()
    }

    fn examined(&self) -> usize {
        self.verified + self.mismatched.len() + self.missing_checksum.len() + self.errors.len()
    }
}

enum Finding {
    Verified,
    Mismatched(String),
    MissingChecksum(String),
    Vanished,
    Failed(RecordFailure),
}

pub struct Auditor {
    cold: Arc<dyn ColdStore>,
    compression: Compression,
    workers: usize,
    policy: OperationPolicy,
}

impl Auditor {
    #[must_use]
    pub fn new(cold: Arc<dyn ColdStore>, config: &TieringConfig) -> Self {
        Self {
            cold,
            compression: config.cold.compression,
            workers: config.archival.workers.max(1),
            policy: OperationPolicy::new(&config.operations),
        }
    }

    /// Audit every archival object, or only those named for `filter`
    pub async fn run(&self, filter: Option<&str>) -> Result<AuditReport> {
        let names: BoxStream<'_, Result<ObjectName>> = match filter {
            Some(id) => stream::iter(ObjectName::candidates(id, self.compression)?)
                .map(Ok)
                .boxed(),
            None => self
                .cold
                .list()
                .try_filter_map(|name| async move {
                    let parsed = ObjectName::parse(&name);
                    if parsed.is_none() {
                        debug!("ignoring non-archival object {name}", name: name.as_str());
                    }
                    Ok(parsed)
                })
                .boxed(),
        };
        info!(
            "integrity audit started for {scope}",
            scope: filter.unwrap_or("all records")
        );

        let mut findings = names
            .map(|name| async move {
                match name {
                    Ok(name) => Ok(self.audit_one(name).await),
                    Err(e) => Err(e),
                }
            })
            .buffer_unordered(self.workers);

        let mut report = AuditReport::default();
        let mut listing_error: Option<TieringError> = None;
        while let Some(finding) = findings.next().await {
            match finding {
                Ok(Finding::Verified) => report.verified += 1,
                Ok(Finding::Mismatched(name)) => report.mismatched.push(name),
                Ok(Finding::MissingChecksum(name)) => report.missing_checksum.push(name),
                Ok(Finding::Vanished) => {}
                Ok(Finding::Failed(failure)) => report.errors.push(failure),
                Err(e) => {
                    error!("failed to list cold objects: {error}", error: e.to_string());
                    listing_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = listing_error {
            return Err(e);
        }

        if let Some(id) = filter {
            if report.examined() == 0 {
                report.errors.push(RecordFailure::new(
                    id,
                    Stage::Locate,
                    TieringError::NotFound(format!("no archived object for {id}")),
                ));
            }
        }

        report.mismatched.sort();
        report.missing_checksum.sort();
        info!(
            "integrity audit done: {verified} verified, {mismatched} mismatched, {missing} without checksum, {failed} failed",
            verified: report.verified,
            mismatched: report.mismatched.len(),
            missing: report.missing_checksum.len(),
            failed: report.errors.len()
        );
        Ok(report)
    }

    async fn audit_one(&self, name: ObjectName) -> Finding {
        let key = name.to_string();
        let object = match self
            .policy
            .run(Tier::Cold, "get", || self.cold.get(&key))
            .await
        {
            Ok(object) => object,
            Err(TieringError::NotFound(_)) => {
                debug!("{name} vanished before it could be audited", name: key.as_str());
                return Finding::Vanished;
            }
            Err(e) => {
                error!("failed to fetch {name}: {error}", name: key.as_str(), error: e.to_string());
                return Finding::Failed(RecordFailure::new(name.record_id(), Stage::Fetch, e));
            }
        };

        match ArchivedObject::verify(&name, &object) {
            Ok(_) => {
                debug!("verified {name}", name: key.as_str());
                Finding::Verified
            }
            Err(TieringError::MissingChecksum(_)) => {
                warn!("{name} has no checksum metadata", name: key.as_str());
                Finding::MissingChecksum(key)
            }
            Err(e @ TieringError::Integrity { .. }) => {
                error!("integrity failure: {error}", error: e.to_string());
                Finding::Mismatched(key)
            }
            Err(e) => Finding::Failed(RecordFailure::new(name.record_id(), Stage::Decode, e)),
        }
    }
}
