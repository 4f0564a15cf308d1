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

//! The normalized, cached view of one instance's license.
//!
//! A [`LicenseRecord`] is created or fully replaced on every successful
//! synchronization or apply operation. Its `days_to_expiry` and `status`
//! fields are always derived from `expiry_date` and the synchronization
//! timestamp via [`crate::classifier::classify`] — they can only be set
//! through [`LicenseRecord::new`], never stored independently.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classifier::{classify, DEFAULT_VALIDITY_DAYS};
use crate::parser::NormalizedFields;

/// Health classification of a license, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LicenseStatus {
    /// More than the warning threshold away from expiry.
    #[serde(rename = "OK")]
    Ok,
    /// Within the warning threshold, including the expiry day itself.
    #[serde(rename = "WARNING")]
    Warning,
    /// Past the expiry date.
    #[serde(rename = "EXPIRED")]
    Expired,
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LicenseStatus::Ok => write!(f, "OK"),
            LicenseStatus::Warning => write!(f, "WARNING"),
            LicenseStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// How a record entered the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseSource {
    /// Pulled from the endpoint during a refresh sweep.
    #[serde(rename = "remote-fetch")]
    RemoteFetch,
    /// Pushed to the endpoint via the apply operation and re-fetched for
    /// verification.
    #[serde(rename = "local-apply")]
    LocalApply,
}

/// The cached license snapshot for one instance.
///
/// At most one current record exists per instance; `upsert` is a full
/// replace-by-key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Foreign key to the configured [`super::Instance`].
    pub instance_id: String,
    /// Organization the license was issued to, when the license material
    /// carries one.
    pub issued_to: Option<String>,
    /// Licensed product name, when present.
    pub product: Option<String>,
    /// Expiry date as stated by the license material. `None` means the
    /// material carried no recognized expiry field; `days_to_expiry` and
    /// `status` are then derived from the one-year default policy.
    pub expiry_date: Option<NaiveDate>,
    /// Whole days between the sync date and the (effective) expiry date.
    /// Negative once expired.
    pub days_to_expiry: i64,
    /// Derived health classification.
    pub status: LicenseStatus,
    /// When this record was produced.
    pub last_synced_at: DateTime<Utc>,
    /// How this record entered the cache.
    pub source: LicenseSource,
}

impl LicenseRecord {
    /// Builds a record from normalized license fields, recomputing
    /// `days_to_expiry` and `status` from the sync timestamp.
    ///
    /// When the license material carried no expiry, the record is
    /// classified as if it were valid for [`DEFAULT_VALIDITY_DAYS`] from
    /// the sync date, so callers always receive a concrete status. The
    /// stored `expiry_date` stays `None` to keep the absence observable.
    pub fn new(
        instance_id: impl Into<String>,
        fields: &NormalizedFields,
        synced_at: DateTime<Utc>,
        source: LicenseSource,
    ) -> Self {
        let today = synced_at.date_naive();
        let effective_expiry = fields
            .expiry_date
            .unwrap_or_else(|| today + Duration::days(DEFAULT_VALIDITY_DAYS));
        let (days_to_expiry, status) = classify(effective_expiry, today);

        Self {
            instance_id: instance_id.into(),
            issued_to: fields.issued_to.clone(),
            product: fields.product.clone(),
            expiry_date: fields.expiry_date,
            days_to_expiry,
            status,
            last_synced_at: synced_at,
            source,
        }
    }
}
