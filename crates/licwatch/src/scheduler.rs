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

//! Daily refresh scheduling.
//!
//! The scheduler is an owned component with an explicit start/stop
//! lifecycle — no ambient global timer. [`Scheduler::start`] spawns a
//! single background loop that sleeps until the next daily trigger time
//! (UTC) and invokes one coalescing sweep per tick: a tick arriving
//! while a sweep is still in flight becomes a no-op, and the following
//! tick proceeds normally.
//!
//! [`SchedulerHandle::stop`] cancels future ticks without interrupting
//! an in-flight sweep. Shutdown follows the usual shape of a shutdown
//! flag plus a `Notify` to wake the sleeper.

use chrono::{DateTime, NaiveTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::engine::SyncEngine;
use crate::models::AuditActor;

/// Factory for the background scheduling loop.
pub struct Scheduler;

/// Handle owning a running scheduling loop.
pub struct SchedulerHandle {
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
    task: tokio::task::JoinHandle<()>,
}

impl Scheduler {
    /// Starts the daily scheduling loop, triggering one coalescing sweep
    /// at `daily_at` (UTC) per day.
    pub fn start(engine: Arc<SyncEngine>, daily_at: NaiveTime) -> SchedulerHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());

        let task = tokio::spawn(run_loop(
            engine,
            daily_at,
            Arc::clone(&shutdown),
            Arc::clone(&notify),
        ));
        info!(trigger_time = %daily_at, "Scheduler started");

        SchedulerHandle {
            shutdown,
            notify,
            task,
        }
    }
}

impl SchedulerHandle {
    /// Cancels future ticks and waits for the loop to wind down. An
    /// in-flight sweep completes before the loop exits.
    pub async fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        // The loop only ever exits on its own; a join failure here means
        // the task panicked, which is worth surfacing in logs.
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Scheduler task terminated abnormally");
        }
        info!("Scheduler stopped");
    }

    /// Whether the background loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_loop(
    engine: Arc<SyncEngine>,
    daily_at: NaiveTime,
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let wait = duration_until_next(Utc::now(), daily_at);
        debug!(seconds = wait.as_secs(), "Sleeping until next daily trigger");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                match engine.try_refresh_all(&AuditActor::System).await {
                    Some(report) => info!(
                        succeeded = report.succeeded(),
                        failed = report.failed(),
                        "Scheduled sweep complete"
                    ),
                    None => info!("Scheduled trigger coalesced; sweep already in progress"),
                }
            }
            _ = notify.notified() => {
                // Shutdown requested while sleeping.
            }
        }
    }
}

/// Time until the next occurrence of `daily_at` (UTC), strictly in the
/// future of `now`.
fn duration_until_next(now: DateTime<Utc>, daily_at: NaiveTime) -> Duration {
    let today_trigger = now.date_naive().and_time(daily_at).and_utc();
    let next = if today_trigger > now {
        today_trigger
    } else {
        today_trigger + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
