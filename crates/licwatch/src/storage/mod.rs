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

//! Storage repository with runtime backend selection.
//!
//! The repository owns the cached [`LicenseRecord`]s and the append-only
//! audit trail. Two interchangeable backends satisfy the same contract
//! with identical observable semantics:
//!
//! - a document-oriented networked store (MongoDB), selected by
//!   `mongodb://` / `mongodb+srv://` URLs;
//! - a durable local file store (one record file per instance plus an
//!   append-only audit log), selected by a directory path.
//!
//! The backend is chosen once at startup from the configured storage
//! URL; business logic never branches on backend identity. Every
//! operation dispatches on the selected variant.
//!
//! # Mutation discipline
//!
//! `upsert` is a full replace-by-key and atomic per instance record.
//! Concurrent writes are safe because each pipeline writes a distinct
//! `instance_id` key; same-key ordering is the engine's responsibility.
//! `append_audit` stamps the commit timestamp and must be durable before
//! returning success — a durability failure is loud, never a silent
//! drop.

#[cfg(feature = "filestore")]
pub mod filestore;
#[cfg(feature = "mongo")]
pub mod mongo;

#[cfg(not(any(feature = "mongo", feature = "filestore")))]
compile_error!("At least one storage backend feature must be enabled: 'mongo' or 'filestore'");

use std::path::PathBuf;
use thiserror::Error;

use crate::models::{AuditEntry, AuditFilter, LicenseRecord, NewAuditEntry};

#[cfg(feature = "filestore")]
use filestore::FileBackend;
#[cfg(feature = "mongo")]
use mongo::MongoBackend;

/// Failures of the storage repository itself. Durability cannot be
/// confirmed when one of these is returned.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A document store operation failed.
    #[cfg(feature = "mongo")]
    #[error("Document store operation failed: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// File store I/O failed.
    #[error("File store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record or audit entry could not be (de)serialized.
    #[error("Failed to serialize or deserialize stored data: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An audit entry could not be made durable. The entry must be
    /// treated as not written.
    #[error("Audit entry could not be made durable: {reason}")]
    AuditDurability { reason: String },

    /// The configured storage URL matches no enabled backend.
    #[error(
        "Unrecognized storage URL '{url}': expected mongodb:// / mongodb+srv:// or a directory path"
    )]
    UnrecognizedUrl { url: String },

    /// A blocking storage task was cancelled before completing.
    #[error("Storage task was cancelled: {0}")]
    TaskCancelled(String),
}

/// The storage backend kind, detected at startup from the storage URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Document-oriented networked store.
    #[cfg(feature = "mongo")]
    Mongo,
    /// Durable local file store.
    #[cfg(feature = "filestore")]
    File,
}

impl BackendType {
    /// Detects the backend type from a storage URL.
    ///
    /// `mongodb://` and `mongodb+srv://` select the document store; a
    /// `file://` URL or a plain directory path selects the file store.
    pub fn from_url(url: &str) -> Result<Self, StorageError> {
        if url.starts_with("mongodb://") || url.starts_with("mongodb+srv://") {
            #[cfg(feature = "mongo")]
            return Ok(BackendType::Mongo);
            #[cfg(not(feature = "mongo"))]
            return Err(StorageError::UnrecognizedUrl {
                url: url.to_string(),
            });
        }

        // Anything without a scheme is treated as a file store root.
        if !url.contains("://") || url.starts_with("file://") {
            #[cfg(feature = "filestore")]
            return Ok(BackendType::File);
        }

        Err(StorageError::UnrecognizedUrl {
            url: url.to_string(),
        })
    }
}

/// The storage repository. Cheap to clone; clones share the selected
/// backend.
#[derive(Debug, Clone)]
pub struct Storage {
    backend: Backend,
}

#[derive(Debug, Clone)]
enum Backend {
    #[cfg(feature = "mongo")]
    Mongo(MongoBackend),
    #[cfg(feature = "filestore")]
    File(FileBackend),
}

impl Storage {
    /// Connects to the backend selected by the storage URL.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let backend = match BackendType::from_url(url)? {
            #[cfg(feature = "mongo")]
            BackendType::Mongo => Backend::Mongo(MongoBackend::connect(url).await?),
            #[cfg(feature = "filestore")]
            BackendType::File => {
                let root = url.strip_prefix("file://").unwrap_or(url);
                Backend::File(FileBackend::open(PathBuf::from(root))?)
            }
        };
        Ok(Self { backend })
    }

    /// Returns the backend kind this repository was opened with.
    pub fn backend(&self) -> BackendType {
        match &self.backend {
            #[cfg(feature = "mongo")]
            Backend::Mongo(_) => BackendType::Mongo,
            #[cfg(feature = "filestore")]
            Backend::File(_) => BackendType::File,
        }
    }

    /// Retrieves the current record for an instance, or `None` when the
    /// instance has never been synced.
    pub async fn get(&self, instance_id: &str) -> Result<Option<LicenseRecord>, StorageError> {
        match &self.backend {
            #[cfg(feature = "mongo")]
            Backend::Mongo(backend) => backend.get(instance_id).await,
            #[cfg(feature = "filestore")]
            Backend::File(backend) => backend.get(instance_id).await,
        }
    }

    /// Fully replaces the record for `record.instance_id`. Atomic per
    /// instance record: readers never observe a half-written record.
    pub async fn upsert(&self, record: &LicenseRecord) -> Result<(), StorageError> {
        match &self.backend {
            #[cfg(feature = "mongo")]
            Backend::Mongo(backend) => backend.upsert(record).await,
            #[cfg(feature = "filestore")]
            Backend::File(backend) => backend.upsert(record).await,
        }
    }

    /// Lists all current records, ordered by instance id.
    pub async fn list(&self) -> Result<Vec<LicenseRecord>, StorageError> {
        match &self.backend {
            #[cfg(feature = "mongo")]
            Backend::Mongo(backend) => backend.list().await,
            #[cfg(feature = "filestore")]
            Backend::File(backend) => backend.list().await,
        }
    }

    /// Appends an audit entry, stamping the commit timestamp. Returns
    /// the committed entry. Durable before returning success.
    pub async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, StorageError> {
        match &self.backend {
            #[cfg(feature = "mongo")]
            Backend::Mongo(backend) => backend.append_audit(entry).await,
            #[cfg(feature = "filestore")]
            Backend::File(backend) => backend.append_audit(entry).await,
        }
    }

    /// Lists audit entries matching the filter, ordered by commit time.
    pub async fn list_audits(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StorageError> {
        match &self.backend {
            #[cfg(feature = "mongo")]
            Backend::Mongo(backend) => backend.list_audits(filter).await,
            #[cfg(feature = "filestore")]
            Backend::File(backend) => backend.list_audits(filter).await,
        }
    }
}
