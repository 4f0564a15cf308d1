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

//! The synchronization engine.
//!
//! Orchestrates, per configured instance, the pipeline
//! fetch → parse → classify → upsert → audit, on demand and on the
//! scheduler's cadence.
//!
//! # Failure isolation
//!
//! A sweep iterates every instance independently: a transport or parse
//! failure on one instance is captured in that instance's result and
//! never aborts its siblings. A failed instance's prior cached record is
//! left untouched — stale-but-valid data is never poisoned with an
//! error state.
//!
//! # Ordering
//!
//! Writes to the same instance's record are serialized through a
//! per-instance lock held across the whole read-modify-write: the
//! previous-status read, the persist, and the audit append. Racing
//! same-key writers therefore observe each other's committed state, so
//! a given threshold crossing is flagged by exactly one of them. Audit
//! appends are ordered by commit time. A storage failure while
//! appending an audit entry always escalates to the caller: audit
//! completeness is a correctness requirement.

use chrono::Utc;
use futures::future;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::client::{EndpointClient, LicenseAgreement, TransportError};
use crate::models::{
    AuditAction, AuditActor, AuditDetails, AuditEntry, AuditFilter, Instance, LicenseRecord,
    LicenseSource, LicenseStatus, NewAuditEntry,
};
use crate::notifier::{Notifier, ThresholdEvent};
use crate::parser::{self, ParseError};
use crate::storage::{Storage, StorageError};

/// A local license file could not be read.
#[derive(Debug, Error)]
#[error("Failed to read license file {path}: {source}")]
pub struct FileError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Per-instance failure during a refresh pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("No instance configured with id '{0}'")]
    UnknownInstance(String),
}

impl SyncError {
    /// Short machine-readable error kind for audit details.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Transport(_) => "transport_error",
            SyncError::Parse(_) => "parse_error",
            SyncError::Storage(_) => "storage_error",
            SyncError::UnknownInstance(_) => "unknown_instance",
        }
    }
}

/// Terminal failure of the apply state machine. No automatic retry is
/// performed — re-invoking is the caller's decision.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The endpoint accepted the upload but the verification re-fetch
    /// still served material with an unchanged expiry.
    #[error("Endpoint did not reflect the applied license: re-fetch served expiry {observed:?}, expected {expected}")]
    VerificationFailed {
        expected: chrono::NaiveDate,
        observed: Option<chrono::NaiveDate>,
    },

    #[error("No instance configured with id '{0}'")]
    UnknownInstance(String),
}

impl ApplyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApplyError::File(_) => "file_error",
            ApplyError::Transport(_) => "transport_error",
            ApplyError::Parse(_) => "parse_error",
            ApplyError::Storage(_) => "storage_error",
            ApplyError::VerificationFailed { .. } => "apply_verification_error",
            ApplyError::UnknownInstance(_) => "unknown_instance",
        }
    }
}

/// Outcome of one instance's pipeline within a sweep.
#[derive(Debug)]
pub struct SyncResult {
    pub instance_id: String,
    pub outcome: Result<LicenseRecord, SyncError>,
}

/// Outcome of a full sweep over the configured instance set.
#[derive(Debug)]
pub struct SyncReport {
    pub started_at: chrono::DateTime<Utc>,
    pub finished_at: chrono::DateTime<Utc>,
    pub results: Vec<SyncResult>,
}

impl SyncReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// The synchronization engine. Cheap to share behind an `Arc`; the
/// scheduler and any number of on-demand callers drive the same
/// instance.
pub struct SyncEngine {
    instances: Vec<Instance>,
    client: EndpointClient,
    storage: Storage,
    notifier: Arc<dyn Notifier>,
    /// Held for the duration of a sweep; a second trigger arriving while
    /// a sweep is in flight is coalesced via `try_lock`.
    sweep_lock: Mutex<()>,
    /// Per-instance write locks serializing persist + audit for
    /// same-key writers.
    record_locks: SyncMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncEngine {
    pub fn new(
        instances: Vec<Instance>,
        client: EndpointClient,
        storage: Storage,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            instances,
            client,
            storage,
            notifier,
            sweep_lock: Mutex::new(()),
            record_locks: SyncMutex::new(HashMap::new()),
        }
    }

    /// The configured instance set, in configuration order.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    fn instance(&self, instance_id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == instance_id)
    }

    fn write_lock(&self, instance_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.record_locks.lock();
        locks
            .entry(instance_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Refreshes every configured instance, waiting for an in-flight
    /// sweep to finish first. Per-instance pipelines run concurrently;
    /// each instance's outcome is captured individually in the report.
    pub async fn refresh_all(&self, actor: &AuditActor) -> SyncReport {
        let _sweep = self.sweep_lock.lock().await;
        self.run_sweep(actor).await
    }

    /// Coalescing variant used by the scheduler: when a sweep is already
    /// in flight the trigger becomes a no-op and `None` is returned.
    pub async fn try_refresh_all(&self, actor: &AuditActor) -> Option<SyncReport> {
        match self.sweep_lock.try_lock() {
            Ok(_sweep) => Some(self.run_sweep(actor).await),
            Err(_) => {
                info!("Sweep already in progress; trigger coalesced into a no-op");
                None
            }
        }
    }

    async fn run_sweep(&self, actor: &AuditActor) -> SyncReport {
        let started_at = Utc::now();
        info!(instances = self.instances.len(), "Starting refresh sweep");

        let pipelines = self.instances.iter().map(|instance| async {
            SyncResult {
                instance_id: instance.id.clone(),
                outcome: self.sync_instance(instance, actor).await,
            }
        });
        let results = future::join_all(pipelines).await;

        let report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            results,
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Refresh sweep complete"
        );
        report
    }

    /// Refreshes a single instance by id.
    pub async fn refresh_one(
        &self,
        instance_id: &str,
        actor: &AuditActor,
    ) -> Result<LicenseRecord, SyncError> {
        let instance = self
            .instance(instance_id)
            .ok_or_else(|| SyncError::UnknownInstance(instance_id.to_string()))?;
        self.sync_instance(instance, actor).await
    }

    /// One instance's pipeline: fetch → parse → classify → persist →
    /// audit. On failure the prior cached record is left untouched and
    /// an `Error` audit entry is appended.
    async fn sync_instance(
        &self,
        instance: &Instance,
        actor: &AuditActor,
    ) -> Result<LicenseRecord, SyncError> {
        // The previous-status read must happen under the same lock as
        // the persist, or two racing same-key writers both see the
        // stale status and both flag the same crossing.
        let lock = self.write_lock(&instance.id);
        let guard = lock.lock().await;

        let previous = self.storage.get(&instance.id).await?;
        let previous_status = previous.as_ref().map(|r| r.status);

        let fields = match self.fetch_and_parse(instance).await {
            Ok(fields) => fields,
            Err(error) => {
                warn!(
                    instance_id = %instance.id,
                    error_kind = error.kind(),
                    error = %error,
                    "Refresh pipeline failed"
                );
                self.storage
                    .append_audit(NewAuditEntry::new(
                        actor.clone(),
                        AuditAction::Error,
                        &instance.id,
                        AuditDetails::failure(previous_status, error.kind(), error.to_string())
                            .into_value(),
                    ))
                    .await?;
                return Err(error);
            }
        };

        let record = LicenseRecord::new(
            &instance.id,
            &fields,
            Utc::now(),
            LicenseSource::RemoteFetch,
        );
        let crossed = threshold_crossed(previous_status, record.status);

        self.storage.upsert(&record).await?;
        self.storage
            .append_audit(NewAuditEntry::new(
                actor.clone(),
                AuditAction::Refresh,
                &instance.id,
                AuditDetails::transition(previous_status, record.status, crossed).into_value(),
            ))
            .await?;
        drop(guard);

        if crossed {
            self.emit_threshold_event(&record, previous_status).await;
        }
        Ok(record)
    }

    async fn fetch_and_parse(
        &self,
        instance: &Instance,
    ) -> Result<parser::NormalizedFields, SyncError> {
        let payload = self.client.fetch(instance).await?;
        Ok(parser::parse(payload.as_bytes())?)
    }

    /// Applies a local license file to an instance.
    ///
    /// Linear state machine: read the file → encode and transmit →
    /// verification re-fetch → persist → audit. Transport failures are
    /// terminal; a verification mismatch never upserts the record and is
    /// never marked successful in the audit log.
    pub async fn apply_license(
        &self,
        instance_id: &str,
        file_path: &Path,
        actor: &AuditActor,
    ) -> Result<LicenseRecord, ApplyError> {
        let instance = self
            .instance(instance_id)
            .ok_or_else(|| ApplyError::UnknownInstance(instance_id.to_string()))?;

        // Same discipline as the refresh pipeline: the previous-status
        // read and the persist share one critical section.
        let lock = self.write_lock(&instance.id);
        let guard = lock.lock().await;

        let previous = self.storage.get(&instance.id).await?;
        let previous_status = previous.as_ref().map(|r| r.status);

        let served = match self.transmit_and_verify(instance, file_path).await {
            Ok(served) => served,
            Err(error) => {
                warn!(
                    instance_id = %instance.id,
                    error_kind = error.kind(),
                    error = %error,
                    "Apply failed"
                );
                self.storage
                    .append_audit(NewAuditEntry::new(
                        actor.clone(),
                        AuditAction::Error,
                        &instance.id,
                        AuditDetails::failure(previous_status, error.kind(), error.to_string())
                            .into_value(),
                    ))
                    .await?;
                return Err(error);
            }
        };

        // Persist what the endpoint actually serves, not what was
        // submitted, so the cache reflects the remote truth.
        let record = LicenseRecord::new(&instance.id, &served, Utc::now(), LicenseSource::LocalApply);
        let crossed = threshold_crossed(previous_status, record.status);

        self.storage.upsert(&record).await?;
        self.storage
            .append_audit(NewAuditEntry::new(
                actor.clone(),
                AuditAction::Apply,
                &instance.id,
                AuditDetails::transition(previous_status, record.status, crossed).into_value(),
            ))
            .await?;
        drop(guard);

        info!(
            instance_id = %instance.id,
            status = %record.status,
            days_to_expiry = record.days_to_expiry,
            "License applied and verified"
        );
        if crossed {
            self.emit_threshold_event(&record, previous_status).await;
        }
        Ok(record)
    }

    /// Validate → encode & transmit → verification re-fetch. Returns the
    /// fields the endpoint serves after the apply.
    async fn transmit_and_verify(
        &self,
        instance: &Instance,
        file_path: &Path,
    ) -> Result<parser::NormalizedFields, ApplyError> {
        // Validate: the local file must be readable and parseable before
        // anything is transmitted.
        let raw = tokio::fs::read(file_path)
            .await
            .map_err(|source| FileError {
                path: file_path.to_path_buf(),
                source,
            })?;
        let submitted = parser::parse(&raw)?;

        // Encode & transmit. A transport failure here is terminal; no
        // partial application is ever recorded as success.
        self.client.apply(instance, &raw).await?;

        // Verify: the endpoint must serve the new material on re-fetch.
        // When the submitted file carried no expiry there is nothing to
        // compare against (the endpoint may substitute its own default),
        // so the expiry check is skipped.
        let payload = self.client.fetch(instance).await?;
        let served = parser::parse(payload.as_bytes())?;

        if let Some(expected) = submitted.expiry_date {
            if served.expiry_date != Some(expected) {
                return Err(ApplyError::VerificationFailed {
                    expected,
                    observed: served.expiry_date,
                });
            }
        }
        Ok(served)
    }

    async fn emit_threshold_event(
        &self,
        record: &LicenseRecord,
        previous_status: Option<LicenseStatus>,
    ) {
        self.notifier
            .notify(&ThresholdEvent {
                instance_id: record.instance_id.clone(),
                previous_status,
                new_status: record.status,
                days_to_expiry: record.days_to_expiry,
                expiry_date: record.expiry_date,
                timestamp: record.last_synced_at,
            })
            .await;
    }

    /// The cached record for one instance, if it has ever been synced.
    pub async fn get_record(
        &self,
        instance_id: &str,
    ) -> Result<Option<LicenseRecord>, StorageError> {
        self.storage.get(instance_id).await
    }

    /// All cached records, ordered by instance id.
    pub async fn list_records(&self) -> Result<Vec<LicenseRecord>, StorageError> {
        self.storage.list().await
    }

    /// Audit trail entries matching the filter, ordered by commit time.
    pub async fn list_audits(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StorageError> {
        self.storage.list_audits(filter).await
    }

    /// Agreement passthrough: reads the acceptance flag from the
    /// instance.
    pub async fn agreement(&self, instance_id: &str) -> Result<LicenseAgreement, SyncError> {
        let instance = self
            .instance(instance_id)
            .ok_or_else(|| SyncError::UnknownInstance(instance_id.to_string()))?;
        Ok(self.client.fetch_agreement(instance).await?)
    }

    /// Agreement passthrough: updates the acceptance flag on the
    /// instance.
    pub async fn set_agreement(
        &self,
        instance_id: &str,
        accepted: bool,
    ) -> Result<LicenseAgreement, SyncError> {
        let instance = self
            .instance(instance_id)
            .ok_or_else(|| SyncError::UnknownInstance(instance_id.to_string()))?;
        Ok(self.client.set_agreement(instance, accepted).await?)
    }
}

/// Whether a transition is an unfavorable crossing into WARNING or
/// EXPIRED. A first observation (no prior record) of an unhealthy
/// license counts as a crossing.
fn threshold_crossed(previous: Option<LicenseStatus>, new: LicenseStatus) -> bool {
    if new == LicenseStatus::Ok {
        return false;
    }
    match previous {
        Some(prev) => prev < new,
        None => true,
    }
}
