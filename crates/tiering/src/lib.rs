// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Tiering - verified movement of aging records from a hot database to cold object storage
//!
//! The archival protocol only ever deletes a hot record after its cold copy
//! has been re-read and its SHA-256 digest recomputed. The auditor, locator
//! and restorer depend on the same object naming and checksum metadata.

mod archive;
mod auditor;
mod codec;
mod cold;
mod config;
mod error;
mod hot;
mod locator;
mod mover;
mod naming;
mod record;
mod report;
mod restorer;
mod retry;

pub use archive::ArchivedObject;
pub use auditor::{AuditReport, Auditor};
pub use codec::{CHECKSUM_KEY, Checksum, Compression};
pub use cold::{ColdObject, ColdStore, Metadata, MetadataLayout, ObjectColdStore};
pub use config::{
    ArchivalConfig, ColdConfig, HotConfig, OperationConfig, RestoreConfig, ServerConfig,
    TieringConfig, parse_human_duration,
};
pub use error::{Tier, TieringError};
pub use hot::{DuckHotStore, HotStore, MemoryHotStore, Page, Predicate, Scanned, scan};
pub use locator::{Located, Locator, LookupError};
pub use mover::{ArchiveReport, Mover};
pub use naming::ObjectName;
pub use record::{
    Eligibility, ID_FIELD, PARTITION_KEY_FIELD, Record, TIMESTAMP_FIELD, parse_timestamp,
    validate_record_id,
};
pub use report::{RecordFailure, Stage};
pub use restorer::{RestoreReport, Restorer};
pub use retry::OperationPolicy;

pub type Result<T> = std::result::Result<T, TieringError>;
