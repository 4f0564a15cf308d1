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

//! Pure status classification against time-based expiry thresholds.
//!
//! Classification is a total function over its domain: every
//! (expiry, today) pair yields a concrete day count and status, with no
//! error cases. The thresholds are evaluated in order:
//!
//! - `days_to_expiry < 0` → [`LicenseStatus::Expired`]
//! - `days_to_expiry <= 30` → [`LicenseStatus::Warning`]
//! - otherwise → [`LicenseStatus::Ok`]
//!
//! A license expiring today (`days_to_expiry == 0`) is WARNING, not
//! EXPIRED — expiry is exclusive on the boundary date itself.

use chrono::NaiveDate;

use crate::models::LicenseStatus;

/// Inclusive upper bound of the WARNING band, in days.
pub const WARNING_THRESHOLD_DAYS: i64 = 30;

/// Assumed validity, in days from fetch time, for license material that
/// carries no recognized expiry field.
pub const DEFAULT_VALIDITY_DAYS: i64 = 365;

/// Classifies an expiry date relative to `today`.
///
/// Returns the signed whole-day distance to expiry together with the
/// derived status.
pub fn classify(expiry: NaiveDate, today: NaiveDate) -> (i64, LicenseStatus) {
    let days_to_expiry = (expiry - today).num_days();
    let status = if days_to_expiry < 0 {
        LicenseStatus::Expired
    } else if days_to_expiry <= WARNING_THRESHOLD_DAYS {
        LicenseStatus::Warning
    } else {
        LicenseStatus::Ok
    };
    (days_to_expiry, status)
}
