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

//! HTTP client for the per-instance license resource.
//!
//! The client wraps a shared `reqwest::Client` with a per-request
//! timeout and maps every transport-level failure (timeout, connection
//! refused, non-success status) to [`TransportError`], kept distinct
//! from parse failures so callers can decide between retrying
//! (transport) and reporting (malformed data).
//!
//! # Endpoint contract
//!
//! - `GET {base_url}/license` returns the raw license material as the
//!   response body.
//! - `PUT {base_url}/license` accepts `{"value": "<base64>"}` carrying
//!   the base64-encoded license file and must serve the new material on
//!   subsequent `GET`s.
//! - `GET`/`PUT {base_url}/license/agreement` exchange the agreement
//!   acceptance flag. The core does not depend on this sub-resource but
//!   must not break it.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::Instance;

/// Transient parsing input: the raw license material served by an
/// endpoint. Exists only within a single pipeline invocation and is
/// never persisted.
#[derive(Debug, Clone)]
pub struct RawLicensePayload(Vec<u8>);

impl RawLicensePayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Network-level failures, safe to retry from the caller's perspective.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request exceeded the configured per-call timeout.
    #[error("Request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The endpoint could not be reached or the exchange failed below
    /// the HTTP layer.
    #[error("Failed to reach {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("Endpoint {url} answered HTTP {status}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The response body could not be read or decoded.
    #[error("Failed to read response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Wire body for `PUT {base_url}/license`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyLicenseRequest {
    /// Base64-encoded raw license file content.
    pub value: String,
}

/// Wire body for the agreement sub-resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LicenseAgreement {
    pub accepted: bool,
}

/// HTTP client for license fetch/apply exchanges against configured
/// instances. Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct EndpointClient {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl EndpointClient {
    /// Creates a client with the given per-request timeout.
    pub fn new(timeout_secs: u64) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(TransportError::ClientBuild)?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    fn license_url(&self, instance: &Instance) -> String {
        format!("{}/license", instance.base_url.trim_end_matches('/'))
    }

    fn agreement_url(&self, instance: &Instance) -> String {
        format!("{}/agreement", self.license_url(instance))
    }

    /// Fetches the raw license material currently served by an instance.
    pub async fn fetch(&self, instance: &Instance) -> Result<RawLicensePayload, TransportError> {
        let url = self.license_url(instance);
        debug!(instance_id = %instance.id, url = %url, "Fetching license");

        let response = self.client.get(&url).send().await;
        let response = self.check(response, &url)?;
        let body = response
            .bytes()
            .await
            .map_err(|source| TransportError::Body {
                url,
                source,
            })?;
        Ok(RawLicensePayload(body.to_vec()))
    }

    /// Pushes a new license file to an instance. The content is
    /// base64-encoded before transmission; the endpoint is expected to
    /// accept, store, and serve it on subsequent fetches.
    pub async fn apply(&self, instance: &Instance, raw: &[u8]) -> Result<(), TransportError> {
        let url = self.license_url(instance);
        debug!(instance_id = %instance.id, url = %url, bytes = raw.len(), "Applying license");

        let body = ApplyLicenseRequest {
            value: BASE64.encode(raw),
        };
        let response = self.client.put(&url).json(&body).send().await;
        self.check(response, &url)?;
        Ok(())
    }

    /// Reads the agreement acceptance flag for an instance.
    pub async fn fetch_agreement(
        &self,
        instance: &Instance,
    ) -> Result<LicenseAgreement, TransportError> {
        let url = self.agreement_url(instance);
        let response = self.client.get(&url).send().await;
        let response = self.check(response, &url)?;
        response
            .json()
            .await
            .map_err(|source| TransportError::Body { url, source })
    }

    /// Updates the agreement acceptance flag for an instance.
    pub async fn set_agreement(
        &self,
        instance: &Instance,
        accepted: bool,
    ) -> Result<LicenseAgreement, TransportError> {
        let url = self.agreement_url(instance);
        let response = self
            .client
            .put(&url)
            .json(&LicenseAgreement { accepted })
            .send()
            .await;
        let response = self.check(response, &url)?;
        response
            .json()
            .await
            .map_err(|source| TransportError::Body { url, source })
    }

    fn check(
        &self,
        response: Result<reqwest::Response, reqwest::Error>,
        url: &str,
    ) -> Result<reqwest::Response, TransportError> {
        let response = response.map_err(|source| {
            if source.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout_secs,
                }
            } else {
                TransportError::Connection {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(TransportError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response)
    }
}
