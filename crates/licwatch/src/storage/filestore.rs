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

//! Durable local file storage backend.
//!
//! Layout under the configured root directory:
//!
//! - `records/<instance_id>.json` — one file per instance, fully
//!   replaced on every upsert via temp file + atomic rename + fsync, so
//!   readers never observe a half-written record.
//! - `audit.log` — append-only JSON lines, one committed audit entry
//!   per line, fsynced before an append reports success. Commit order
//!   on disk is the query order.
//!
//! Blocking filesystem work runs on the tokio blocking pool. A
//! per-instance async lock serializes same-key record writes inside the
//! backend; a single append lock serializes audit writes.

use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use super::StorageError;
use crate::models::{AuditEntry, AuditFilter, LicenseRecord, NewAuditEntry};

const RECORDS_DIR: &str = "records";
const AUDIT_LOG: &str = "audit.log";

/// File-based storage backend rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    records_dir: PathBuf,
    audit_path: PathBuf,
    record_locks: Arc<SyncMutex<HashMap<String, Arc<Mutex<()>>>>>,
    audit_lock: Arc<Mutex<()>>,
}

impl FileBackend {
    /// Opens (and creates, if needed) the storage layout under `root`.
    pub fn open(root: PathBuf) -> Result<Self, StorageError> {
        let records_dir = root.join(RECORDS_DIR);
        std::fs::create_dir_all(&records_dir).map_err(|source| StorageError::Io {
            path: records_dir.clone(),
            source,
        })?;
        Ok(Self {
            records_dir,
            audit_path: root.join(AUDIT_LOG),
            record_locks: Arc::new(SyncMutex::new(HashMap::new())),
            audit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn record_path(&self, instance_id: &str) -> PathBuf {
        self.records_dir.join(format!("{instance_id}.json"))
    }

    fn lock_for(&self, instance_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.record_locks.lock();
        locks
            .entry(instance_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn get(&self, instance_id: &str) -> Result<Option<LicenseRecord>, StorageError> {
        let path = self.record_path(instance_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub async fn upsert(&self, record: &LicenseRecord) -> Result<(), StorageError> {
        let lock = self.lock_for(&record.instance_id);
        let _guard = lock.lock().await;

        let path = self.record_path(&record.instance_id);
        let records_dir = self.records_dir.clone();
        let json = serde_json::to_vec_pretty(record)?;

        run_blocking(move || write_atomically(&records_dir, &path, &json)).await?;
        debug!(instance_id = %record.instance_id, "Record upserted to file store");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<LicenseRecord>, StorageError> {
        let mut records = Vec::new();
        let mut dir =
            tokio::fs::read_dir(&self.records_dir)
                .await
                .map_err(|source| StorageError::Io {
                    path: self.records_dir.clone(),
                    source,
                })?;
        while let Some(entry) = dir.next_entry().await.map_err(|source| StorageError::Io {
            path: self.records_dir.clone(),
            source,
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| StorageError::Io { path, source })?;
            records.push(serde_json::from_slice::<LicenseRecord>(&bytes)?);
        }
        records.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        Ok(records)
    }

    pub async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, StorageError> {
        let _guard = self.audit_lock.lock().await;

        // Commit timestamp is stamped under the append lock, so on-disk
        // order and timestamp order agree.
        let committed = entry.into_entry(Utc::now());
        let mut line = serde_json::to_string(&committed)?;
        line.push('\n');
        let path = self.audit_path.clone();

        run_blocking(move || {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| StorageError::Io {
                    path: path.clone(),
                    source,
                })?;
            file.write_all(line.as_bytes())
                .map_err(|source| StorageError::Io {
                    path: path.clone(),
                    source,
                })?;
            file.sync_all().map_err(|e| StorageError::AuditDurability {
                reason: format!("fsync of {} failed: {e}", path.display()),
            })
        })
        .await?;

        Ok(committed)
    }

    pub async fn list_audits(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StorageError> {
        let content = match tokio::fs::read_to_string(&self.audit_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.audit_path.clone(),
                    source,
                })
            }
        };

        let mut entries = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let entry: AuditEntry = serde_json::from_str(line)?;
            if filter.matches(&entry) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

/// Full-replace write: serialize into a temp file in the same directory,
/// fsync it, then rename over the destination.
fn write_atomically(dir: &Path, dest: &Path, content: &[u8]) -> Result<(), StorageError> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|source| StorageError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    tmp.write_all(content).map_err(|source| StorageError::Io {
        path: tmp.path().to_path_buf(),
        source,
    })?;
    tmp.as_file()
        .sync_all()
        .map_err(|source| StorageError::Io {
            path: tmp.path().to_path_buf(),
            source,
        })?;
    tmp.persist(dest).map_err(|e| StorageError::Io {
        path: dest.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

async fn run_blocking<T, F>(work: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StorageError::TaskCancelled(e.to_string()))?
}
