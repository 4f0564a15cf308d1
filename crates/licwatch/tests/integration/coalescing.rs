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

//! Sweep coalescing and scheduler lifecycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use licwatch::models::AuditActor;
use licwatch::scheduler::Scheduler;

use crate::support;

#[tokio::test]
async fn trigger_during_inflight_sweep_is_coalesced() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let storage = support::file_storage(tmp.path()).await;

    Mock::given(method("GET"))
        .and(path("/pf1/license"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("EXPIRY={}", support::expiry_in_days(120)))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let instances = vec![support::instance("pf1", &format!("{}/pf1", server.uri()))];
    let engine = Arc::new(support::engine(instances, storage, 5));

    let sweeping = Arc::clone(&engine);
    let sweep = tokio::spawn(async move { sweeping.refresh_all(&AuditActor::System).await });

    // Give the spawned sweep time to take the lock and block on the
    // slow endpoint.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.try_refresh_all(&AuditActor::System).await.is_none());

    let report = sweep.await.unwrap();
    assert_eq!(report.succeeded(), 1);

    // With no sweep in flight the trigger runs normally.
    let report = engine
        .try_refresh_all(&AuditActor::System)
        .await
        .expect("no sweep in flight");
    assert_eq!(report.succeeded(), 1);
}

#[tokio::test]
async fn scheduler_idles_until_stopped() {
    let tmp = TempDir::new().unwrap();
    let storage = support::file_storage(tmp.path()).await;
    let engine = Arc::new(support::engine(vec![], storage, 5));

    // A trigger an hour away keeps the loop asleep for the whole test.
    let daily_at = (Utc::now() + chrono::Duration::hours(1)).time();
    let handle = Scheduler::start(engine, daily_at);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .expect("scheduler should stop promptly");
}
