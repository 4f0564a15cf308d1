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

//! Apply state machine tests: happy path with verification, the
//! verification-failure guarantee (no upsert, no success audit), and
//! terminal file/transport failures.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use licwatch::client::TransportError;
use licwatch::engine::ApplyError;
use licwatch::models::{AuditAction, AuditActor, AuditFilter, LicenseSource, LicenseStatus};

use crate::support;

fn write_license_file(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("license.lic");
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn apply_transmits_verifies_and_persists() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let storage = support::file_storage(tmp.path()).await;

    let expiry = support::expiry_in_days(200);
    let content = format!("EXPIRY={expiry}\nOrganization=Acme Corp");
    let file = write_license_file(&tmp, &content);

    Mock::given(method("PUT"))
        .and(path("/pf1/license"))
        .and(body_json(json!({ "value": BASE64.encode(content.as_bytes()) })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pf1/license"))
        .respond_with(ResponseTemplate::new(200).set_body_string(content.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let instances = vec![support::instance("pf1", &format!("{}/pf1", server.uri()))];
    let engine = support::engine(instances, storage.clone(), 5);

    let record = engine
        .apply_license("pf1", &file, &AuditActor::User("ops".to_string()))
        .await
        .unwrap();
    assert_eq!(record.status, LicenseStatus::Ok);
    assert_eq!(record.source, LicenseSource::LocalApply);
    assert_eq!(record.issued_to.as_deref(), Some("Acme Corp"));

    let cached = storage.get("pf1").await.unwrap().expect("persisted record");
    assert_eq!(cached.expiry_date, record.expiry_date);

    let audits = storage
        .list_audits(&AuditFilter::for_instance("pf1"))
        .await
        .unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].action, AuditAction::Apply);
    assert_eq!(
        audits[0].actor,
        AuditActor::User("ops".to_string())
    );
}

#[tokio::test]
async fn verification_mismatch_never_persists_a_record() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let storage = support::file_storage(tmp.path()).await;

    let new_expiry = support::expiry_in_days(200);
    let stale_expiry = support::expiry_in_days(5);
    let file = write_license_file(&tmp, &format!("EXPIRY={new_expiry}"));

    // The endpoint accepts the upload but keeps serving the old
    // material.
    Mock::given(method("PUT"))
        .and(path("/pf1/license"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pf1/license"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("EXPIRY={stale_expiry}")))
        .mount(&server)
        .await;

    let instances = vec![support::instance("pf1", &format!("{}/pf1", server.uri()))];
    let engine = support::engine(instances, storage.clone(), 5);

    let outcome = engine
        .apply_license("pf1", &file, &AuditActor::User("ops".to_string()))
        .await;
    assert!(matches!(outcome, Err(ApplyError::VerificationFailed { .. })));

    assert!(storage.get("pf1").await.unwrap().is_none());

    let audits = storage
        .list_audits(&AuditFilter::for_instance("pf1"))
        .await
        .unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].action, AuditAction::Error);
    assert_eq!(audits[0].details["error_kind"], "apply_verification_error");
}

#[tokio::test]
async fn unreadable_file_fails_before_any_transmission() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let storage = support::file_storage(tmp.path()).await;

    Mock::given(method("PUT"))
        .and(path("/pf1/license"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let instances = vec![support::instance("pf1", &format!("{}/pf1", server.uri()))];
    let engine = support::engine(instances, storage.clone(), 5);

    let missing = tmp.path().join("no-such-file.lic");
    let outcome = engine
        .apply_license("pf1", &missing, &AuditActor::User("ops".to_string()))
        .await;
    assert!(matches!(outcome, Err(ApplyError::File(_))));
    assert!(storage.get("pf1").await.unwrap().is_none());
}

#[tokio::test]
async fn rejected_upload_is_a_terminal_transport_error() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let storage = support::file_storage(tmp.path()).await;

    let file = write_license_file(&tmp, &format!("EXPIRY={}", support::expiry_in_days(200)));

    Mock::given(method("PUT"))
        .and(path("/pf1/license"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let instances = vec![support::instance("pf1", &format!("{}/pf1", server.uri()))];
    let engine = support::engine(instances, storage.clone(), 5);

    let outcome = engine
        .apply_license("pf1", &file, &AuditActor::User("ops".to_string()))
        .await;
    assert!(matches!(
        outcome,
        Err(ApplyError::Transport(TransportError::UnexpectedStatus { .. }))
    ));
    assert!(storage.get("pf1").await.unwrap().is_none());

    let audits = storage
        .list_audits(&AuditFilter::for_instance("pf1"))
        .await
        .unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].details["error_kind"], "transport_error");
}
