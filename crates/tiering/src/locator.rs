// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Point lookups that fall back from the hot tier to the cold tier

use crate::archive::ArchivedObject;
use crate::codec::Compression;
use crate::cold::ColdStore;
use crate::config::TieringConfig;
use crate::error::{Tier, TieringError};
use crate::hot::HotStore;
use crate::naming::ObjectName;
use crate::record::{Record, validate_record_id};
use crate::retry::OperationPolicy;
use diagnostics::*;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Record {0} not found")]
    NotFound(String),

    #[error("Hot tier unavailable: {0}")]
    UpstreamUnavailable(#[source] TieringError),

    #[error("Internal error: {0}")]
    Internal(#[source] TieringError),
}

/// A record and the tier that served it
#[derive(Debug, Clone)]
pub struct Located {
    pub record: Record,
    pub tier: Tier,
}

pub struct Locator {
    hot: Arc<dyn HotStore>,
    cold: Arc<dyn ColdStore>,
    compression: Compression,
    policy: OperationPolicy,
}

impl Locator {
    #[must_use]
    pub fn new(hot: Arc<dyn HotStore>, cold: Arc<dyn ColdStore>, config: &TieringConfig) -> Self {
        Self {
            hot,
            cold,
            compression: config.cold.compression,
            policy: OperationPolicy::new(&config.operations),
        }
    }

    pub async fn lookup(&self, id: &str) -> Result<Record, LookupError> {
        self.locate(id).await.map(|located| located.record)
    }

    /// Hot tier first, then each codec's object name in preference order
    ///
    /// The read path does not re-verify checksums; that is the auditor's job.
    pub async fn locate(&self, id: &str) -> Result<Located, LookupError> {
        if id.is_empty() {
            return Err(LookupError::BadRequest("missing record id".to_string()));
        }
        validate_record_id(id).map_err(|e| LookupError::BadRequest(e.to_string()))?;

        match self
            .policy
            .run(Tier::Hot, "get", || self.hot.get(id))
            .await
        {
            Ok(Some(record)) => {
                debug!("{id} served from hot tier", id: id);
                return Ok(Located {
                    record,
                    tier: Tier::Hot,
                });
            }
            Ok(None) => {}
            Err(e) => {
                error!("hot lookup of {id} failed: {error}", id: id, error: e.to_string());
                return Err(LookupError::UpstreamUnavailable(e));
            }
        }

        let candidates = ObjectName::candidates(id, self.compression)
            .map_err(|e| LookupError::BadRequest(e.to_string()))?;
        for name in candidates {
            let key = name.to_string();
            let object = match self
                .policy
                .run(Tier::Cold, "get", || self.cold.get(&key))
                .await
            {
                Ok(object) => object,
                Err(TieringError::NotFound(_)) => continue,
                Err(e) => {
                    error!(
                        "cold lookup of {name} failed: {error}",
                        name: key.as_str(),
                        error: e.to_string()
                    );
                    return Err(LookupError::Internal(e));
                }
            };

            let record = ArchivedObject::decode(&name, &object)
                .and_then(|bytes| Record::from_slice(&bytes))
                .map_err(|e| {
                    error!(
                        "cannot decode {name}: {error}",
                        name: key.as_str(),
                        error: e.to_string()
                    );
                    LookupError::Internal(e)
                })?;
            debug!("{id} served from cold object {name}", id: id, name: key.as_str());
            return Ok(Located {
                record,
                tier: Tier::Cold,
            });
        }

        Err(LookupError::NotFound(id.to_string()))
    }
}
