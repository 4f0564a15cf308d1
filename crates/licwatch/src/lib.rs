/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Licwatch: license synchronization and status tracking for fleets of
//! license-bearing endpoints.
//!
//! Licwatch fetches raw license material from independently addressable
//! endpoints, parses the heterogeneous key-value license dialects into a
//! normalized record, classifies each license against time-based expiry
//! thresholds, caches the result behind a swappable storage repository,
//! and appends an immutable audit entry for every state-changing
//! operation.
//!
//! # Architecture
//!
//! The crate is composed leaf-to-root:
//!
//! - [`parser`] — pure translation of raw license bytes into
//!   [`parser::NormalizedFields`]. No dependencies.
//! - [`classifier`] — pure classification of an expiry date against the
//!   warning/expiry thresholds. No dependencies.
//! - [`client`] — HTTP exchange with each endpoint's license resource.
//! - [`storage`] — the repository holding cached [`models::LicenseRecord`]s
//!   and the append-only audit trail, with a document-store backend and a
//!   durable file backend selected at startup from the storage URL.
//! - [`engine`] — the synchronization engine orchestrating
//!   fetch → parse → classify → persist → audit per instance.
//! - [`scheduler`] — a daily background trigger driving the engine, with
//!   overlapping sweeps coalesced into no-ops.
//! - [`notifier`] — the outbound sink invoked when a license transitions
//!   into WARNING or EXPIRED.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use licwatch::config::LicwatchConfig;
//! use licwatch::client::EndpointClient;
//! use licwatch::engine::SyncEngine;
//! use licwatch::models::AuditActor;
//! use licwatch::notifier::LogNotifier;
//! use licwatch::storage::Storage;
//!
//! let config = LicwatchConfig::load(None)?;
//! config.validate()?;
//!
//! let storage = Storage::connect(&config.storage.url).await?;
//! let client = EndpointClient::new(config.client.timeout_secs)?;
//! let engine = Arc::new(SyncEngine::new(
//!     config.instances.clone(),
//!     client,
//!     storage,
//!     Arc::new(LogNotifier),
//! ));
//!
//! let report = engine.refresh_all(&AuditActor::System).await;
//! println!("{} synced, {} failed", report.succeeded(), report.failed());
//! ```

pub mod classifier;
pub mod client;
pub mod config;
pub mod engine;
pub mod models;
pub mod notifier;
pub mod parser;
pub mod scheduler;
pub mod storage;

pub use classifier::{classify, DEFAULT_VALIDITY_DAYS, WARNING_THRESHOLD_DAYS};
pub use client::{EndpointClient, LicenseAgreement, RawLicensePayload, TransportError};
pub use config::{ConfigError, LicwatchConfig};
pub use engine::{ApplyError, FileError, SyncEngine, SyncError, SyncReport, SyncResult};
pub use models::{
    AuditAction, AuditActor, AuditEntry, AuditFilter, Instance, LicenseRecord, LicenseSource,
    LicenseStatus, NewAuditEntry,
};
pub use notifier::{LogNotifier, Notifier, NullNotifier, ThresholdEvent};
pub use parser::{parse, NormalizedFields, ParseError};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use storage::{BackendType, Storage, StorageError};
