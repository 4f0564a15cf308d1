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

//! Immutable audit trail entries.
//!
//! Every state-changing operation appends exactly one [`AuditEntry`] per
//! pipeline outcome, success or failure. Entries are append-only: no
//! entry is ever mutated or removed, and the storage backends order them
//! by commit time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::license::LicenseStatus;

/// Who triggered a state-changing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    /// The background scheduler.
    System,
    /// An operator, identified by login name.
    User(String),
}

/// The operation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A refresh pipeline completed for an instance.
    Refresh,
    /// A license file was applied to an instance and verified.
    Apply,
    /// A pipeline step failed; `details` carries the error kind.
    Error,
}

/// A committed, immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier.
    pub id: Uuid,
    /// Commit timestamp, stamped by the storage repository at append
    /// time so entries are ordered by completion, not submission.
    pub timestamp: DateTime<Utc>,
    /// Who triggered the operation.
    pub actor: AuditActor,
    /// What happened.
    pub action: AuditAction,
    /// The instance the operation targeted.
    pub instance_id: String,
    /// Structured payload: before/after status, threshold crossing,
    /// error kind and message.
    pub details: serde_json::Value,
}

/// An audit entry that has not yet been committed.
///
/// The repository assigns the id and commit timestamp when appending.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub actor: AuditActor,
    pub action: AuditAction,
    pub instance_id: String,
    pub details: serde_json::Value,
}

impl NewAuditEntry {
    pub fn new(
        actor: AuditActor,
        action: AuditAction,
        instance_id: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            actor,
            action,
            instance_id: instance_id.into(),
            details,
        }
    }

    /// Stamps the entry with its commit identity. Called by the storage
    /// backends at append time.
    pub fn into_entry(self, timestamp: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            timestamp,
            actor: self.actor,
            action: self.action,
            instance_id: self.instance_id,
            details: self.details,
        }
    }
}

/// The structured `details` payload for refresh and apply entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<LicenseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<LicenseStatus>,
    #[serde(default)]
    pub threshold_crossed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuditDetails {
    pub fn transition(
        previous: Option<LicenseStatus>,
        new: LicenseStatus,
        threshold_crossed: bool,
    ) -> Self {
        Self {
            previous_status: previous,
            new_status: Some(new),
            threshold_crossed,
            ..Self::default()
        }
    }

    pub fn failure(
        previous: Option<LicenseStatus>,
        error_kind: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            previous_status: previous,
            error_kind: Some(error_kind.into()),
            error_message: Some(error_message.into()),
            ..Self::default()
        }
    }

    pub fn into_value(self) -> serde_json::Value {
        // AuditDetails has no non-serializable members, so this cannot
        // fail; fall back to Null rather than panic.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Query filter for the audit trail, shared by both storage backends so
/// their observable semantics stay identical.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Restrict to one instance.
    pub instance_id: Option<String>,
    /// Inclusive lower bound on the commit timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the commit timestamp.
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn for_instance(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(id) = &self.instance_id {
            if entry.instance_id != *id {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        true
    }
}
