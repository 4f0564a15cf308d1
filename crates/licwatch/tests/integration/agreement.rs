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

//! Agreement sub-resource passthrough: the `{"accepted": bool}` wire
//! shape round-trips unchanged through the engine.

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use licwatch::engine::SyncError;

use crate::support;

#[tokio::test]
async fn agreement_flag_round_trips_through_the_engine() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let storage = support::file_storage(tmp.path()).await;

    Mock::given(method("GET"))
        .and(path("/pf1/license/agreement"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accepted": false })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/pf1/license/agreement"))
        .and(body_json(json!({ "accepted": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accepted": true })))
        .expect(1)
        .mount(&server)
        .await;

    let instances = vec![support::instance("pf1", &format!("{}/pf1", server.uri()))];
    let engine = support::engine(instances, storage, 5);

    let before = engine.agreement("pf1").await.unwrap();
    assert!(!before.accepted);

    let after = engine.set_agreement("pf1", true).await.unwrap();
    assert!(after.accepted);
}

#[tokio::test]
async fn agreement_on_unknown_instance_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let storage = support::file_storage(tmp.path()).await;
    let engine = support::engine(vec![], storage, 5);

    let outcome = engine.agreement("pf9").await;
    assert!(matches!(outcome, Err(SyncError::UnknownInstance(_))));
}
