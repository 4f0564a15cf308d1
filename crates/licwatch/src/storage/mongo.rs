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

//! Document-oriented networked storage backend (MongoDB).
//!
//! Records live in the `license_records` collection, keyed by
//! `instance_id` and fully replaced on upsert (`replace_one` with
//! upsert, which is atomic per document). Audit entries are inserted
//! into the append-only `audit_entries` collection with an acknowledged
//! write concern, so a successful append is durable at the server
//! before this backend reports success.
//!
//! Time-range filtering reuses [`AuditFilter::matches`] client-side so
//! both backends expose identical filter semantics.

use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection};
use tracing::debug;

use super::StorageError;
use crate::models::{AuditEntry, AuditFilter, LicenseRecord, NewAuditEntry};

/// Database name used when the connection URL does not carry one.
const DEFAULT_DATABASE: &str = "licwatch";

const RECORDS_COLLECTION: &str = "license_records";
const AUDIT_COLLECTION: &str = "audit_entries";

/// MongoDB-backed storage.
#[derive(Debug, Clone)]
pub struct MongoBackend {
    records: Collection<LicenseRecord>,
    audits: Collection<AuditEntry>,
}

impl MongoBackend {
    /// Connects to the deployment named by the URL. The database is
    /// taken from the URL path, falling back to `licwatch`.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client = Client::with_uri_str(url).await?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        debug!(database = %database.name(), "Connected to document store");
        Ok(Self {
            records: database.collection(RECORDS_COLLECTION),
            audits: database.collection(AUDIT_COLLECTION),
        })
    }

    pub async fn get(&self, instance_id: &str) -> Result<Option<LicenseRecord>, StorageError> {
        let record = self
            .records
            .find_one(doc! { "instance_id": instance_id })
            .await?;
        Ok(record)
    }

    pub async fn upsert(&self, record: &LicenseRecord) -> Result<(), StorageError> {
        self.records
            .replace_one(doc! { "instance_id": &record.instance_id }, record)
            .upsert(true)
            .await?;
        debug!(instance_id = %record.instance_id, "Record upserted to document store");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<LicenseRecord>, StorageError> {
        let cursor = self.records.find(doc! {}).await?;
        let mut records: Vec<LicenseRecord> = cursor.try_collect().await?;
        records.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        Ok(records)
    }

    pub async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, StorageError> {
        let committed = entry.into_entry(Utc::now());
        self.audits.insert_one(&committed).await?;
        Ok(committed)
    }

    pub async fn list_audits(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StorageError> {
        // Instance restriction is pushed to the server; the time-range
        // bounds reuse the shared filter predicate.
        let query = match &filter.instance_id {
            Some(id) => doc! { "instance_id": id },
            None => doc! {},
        };
        let cursor = self.audits.find(query).await?;
        let mut entries: Vec<AuditEntry> = cursor.try_collect().await?;
        entries.retain(|entry| filter.matches(entry));
        entries.sort_by_key(|entry| entry.timestamp);
        Ok(entries)
    }
}
