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

//! Storage contract exercised through the repository facade.
//!
//! The same sequence of operations must be observably identical on
//! every backend. The file store runs unconditionally; the document
//! store variant needs a local MongoDB and is ignored by default
//! (`cargo test -- --ignored` with an instance on localhost:27017).

use chrono::Utc;
use tempfile::TempDir;

use licwatch::models::{
    AuditAction, AuditActor, AuditFilter, LicenseRecord, LicenseSource, NewAuditEntry,
};
use licwatch::parser;
use licwatch::storage::{BackendType, Storage};

use crate::support;

fn record(instance_id: &str, expiry_days: i64) -> LicenseRecord {
    let fields = parser::parse(
        format!(
            "EXPIRY={}\nOrganization=Acme",
            support::expiry_in_days(expiry_days)
        )
        .as_bytes(),
    )
    .unwrap();
    LicenseRecord::new(instance_id, &fields, Utc::now(), LicenseSource::RemoteFetch)
}

fn audit(instance_id: &str) -> NewAuditEntry {
    NewAuditEntry::new(
        AuditActor::System,
        AuditAction::Refresh,
        instance_id,
        serde_json::json!({ "threshold_crossed": false }),
    )
}

/// The observable contract both backends must satisfy.
async fn exercise_contract(storage: Storage) {
    // Unknown instances read as absent, not as an error.
    assert!(storage.get("pf9").await.unwrap().is_none());
    assert!(storage.list().await.unwrap().is_empty());

    // Upsert out of order; listing is sorted by instance id.
    storage.upsert(&record("pf2", 120)).await.unwrap();
    storage.upsert(&record("pf1", 90)).await.unwrap();
    let listed = storage.list().await.unwrap();
    assert_eq!(
        listed.iter().map(|r| r.instance_id.as_str()).collect::<Vec<_>>(),
        vec!["pf1", "pf2"]
    );

    // Upsert is a full replace by key.
    let replacement = record("pf1", 10);
    storage.upsert(&replacement).await.unwrap();
    assert_eq!(storage.list().await.unwrap().len(), 2);
    let fetched = storage.get("pf1").await.unwrap().unwrap();
    assert_eq!(fetched.status, replacement.status);
    assert_eq!(fetched.days_to_expiry, replacement.days_to_expiry);

    // Audit entries are stamped at commit and listed in commit order.
    let first = storage.append_audit(audit("pf1")).await.unwrap();
    let second = storage.append_audit(audit("pf2")).await.unwrap();
    let third = storage.append_audit(audit("pf1")).await.unwrap();
    assert!(first.timestamp <= second.timestamp);
    assert!(second.timestamp <= third.timestamp);

    let all = storage.list_audits(&AuditFilter::default()).await.unwrap();
    assert_eq!(
        all.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![first.id, second.id, third.id]
    );

    let pf1_only = storage
        .list_audits(&AuditFilter::for_instance("pf1"))
        .await
        .unwrap();
    assert_eq!(
        pf1_only.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![first.id, third.id]
    );

    // The since bound is inclusive on commit timestamps.
    let from_second = storage
        .list_audits(&AuditFilter {
            since: Some(second.timestamp),
            ..AuditFilter::default()
        })
        .await
        .unwrap();
    assert!(from_second.iter().all(|e| e.timestamp >= second.timestamp));
    assert!(from_second.iter().any(|e| e.id == second.id));
}

#[tokio::test]
async fn file_backend_satisfies_the_contract() {
    let tmp = TempDir::new().unwrap();
    let storage = support::file_storage(tmp.path()).await;
    assert_eq!(storage.backend(), BackendType::File);
    exercise_contract(storage).await;
}

#[tokio::test]
#[ignore = "requires a local MongoDB on localhost:27017"]
async fn mongo_backend_satisfies_the_contract() {
    let url = format!(
        "mongodb://localhost:27017/licwatch_contract_{}",
        uuid::Uuid::new_v4().simple()
    );
    let storage = Storage::connect(&url).await.expect("mongo should connect");
    assert_eq!(storage.backend(), BackendType::Mongo);
    exercise_contract(storage).await;
}
