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

//! Shared fixtures for the integration suite.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use licwatch::client::EndpointClient;
use licwatch::engine::SyncEngine;
use licwatch::models::Instance;
use licwatch::notifier::{Notifier, NullNotifier, ThresholdEvent};
use licwatch::storage::Storage;

pub fn instance(id: &str, base_url: &str) -> Instance {
    Instance {
        id: id.to_string(),
        display_name: format!("Instance {id}"),
        environment: "test".to_string(),
        base_url: base_url.to_string(),
    }
}

/// Opens a file-store repository rooted at the given temp directory.
pub async fn file_storage(root: &Path) -> Storage {
    Storage::connect(root.to_str().expect("utf-8 temp path"))
        .await
        .expect("file store should open")
}

/// Builds an engine over the given instances and storage with a short
/// request timeout and no notification sink.
pub fn engine(instances: Vec<Instance>, storage: Storage, timeout_secs: u64) -> SyncEngine {
    SyncEngine::new(
        instances,
        EndpointClient::new(timeout_secs).expect("client should build"),
        storage,
        Arc::new(NullNotifier),
    )
}

/// Notifier that counts delivered events, for asserting threshold
/// crossings.
#[derive(Debug, Default)]
pub struct CountingNotifier {
    delivered: AtomicUsize,
}

impl CountingNotifier {
    pub fn count(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, _event: &ThresholdEvent) {
        self.delivered.fetch_add(1, Ordering::SeqCst);
    }
}

/// An expiry date the given number of days from today, formatted for a
/// license file.
pub fn expiry_in_days(days: i64) -> String {
    (chrono::Utc::now().date_naive() + chrono::Duration::days(days)).to_string()
}
