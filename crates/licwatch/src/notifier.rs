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

//! Outbound notification sink for threshold crossings.
//!
//! The engine emits a [`ThresholdEvent`] whenever a license transitions
//! into WARNING or EXPIRED in the unfavorable direction. Delivery is
//! fire-and-forget: sink failures are the collaborator's concern and are
//! never propagated back into the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::LicenseStatus;

/// Structured event describing an unfavorable status transition.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdEvent {
    pub instance_id: String,
    /// Status before the transition; `None` when the instance had no
    /// cached record yet.
    pub previous_status: Option<LicenseStatus>,
    pub new_status: LicenseStatus,
    pub days_to_expiry: i64,
    pub expiry_date: Option<NaiveDate>,
    pub timestamp: DateTime<Utc>,
}

/// Notification sink. Implementations must tolerate concurrent calls.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &ThresholdEvent);
}

/// Event types for threshold notifications.
pub mod events {
    /// A license entered the warning band.
    pub const LICENSE_WARNING: &str = "license.threshold.warning";
    /// A license expired.
    pub const LICENSE_EXPIRED: &str = "license.threshold.expired";
}

/// Notifier that emits structured tracing events, suitable for log
/// shipping to an alerting pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &ThresholdEvent) {
        let expiry = event
            .expiry_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        match event.new_status {
            LicenseStatus::Expired => tracing::error!(
                event_type = events::LICENSE_EXPIRED,
                instance_id = %event.instance_id,
                days_to_expiry = event.days_to_expiry,
                expiry_date = %expiry,
                "License EXPIRED: instance={} expired {}d ago ({})",
                event.instance_id,
                event.days_to_expiry.abs(),
                expiry
            ),
            LicenseStatus::Warning => tracing::warn!(
                event_type = events::LICENSE_WARNING,
                instance_id = %event.instance_id,
                days_to_expiry = event.days_to_expiry,
                expiry_date = %expiry,
                "License WARNING: instance={} expires in {}d ({})",
                event.instance_id,
                event.days_to_expiry,
                expiry
            ),
            LicenseStatus::Ok => {}
        }
    }
}

/// Notifier that drops every event. Used in tests and when notification
/// delivery is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _event: &ThresholdEvent) {}
}
