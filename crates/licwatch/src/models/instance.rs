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

use serde::{Deserialize, Serialize};

/// A configured license-bearing endpoint.
///
/// Instances are read from static configuration at process start and are
/// immutable for the lifetime of a run. They are never persisted as
/// mutable state — the instance list is re-read from configuration on
/// every process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Unique, stable identifier. Used as the storage key for the
    /// instance's cached license record.
    pub id: String,
    /// Human-readable name for display surfaces.
    pub display_name: String,
    /// Environment tag (e.g. `prod`, `staging`).
    pub environment: String,
    /// Base URL of the endpoint's admin API. The license resource lives
    /// at `{base_url}/license`.
    pub base_url: String,
}
