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

//! Command implementations: each maps one CLI subcommand onto the
//! engine's fixed operation surface and renders the outcome for an
//! operator.

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use std::path::Path;
use std::sync::Arc;

use licwatch::config::LicwatchConfig;
use licwatch::engine::SyncEngine;
use licwatch::models::{AuditActor, AuditFilter, LicenseRecord, LicenseStatus};
use licwatch::scheduler::Scheduler;

/// The operator identity used for audit attribution of CLI-triggered
/// operations.
pub fn cli_actor() -> AuditActor {
    let user = std::env::var("USER").unwrap_or_else(|_| "cli".to_string());
    AuditActor::User(user)
}

pub async fn refresh(engine: &SyncEngine) -> Result<()> {
    let report = engine.refresh_all(&cli_actor()).await;

    println!(
        "Refresh completed: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    for result in &report.results {
        match &result.outcome {
            Ok(record) => println!(
                "  {:<12} {:<8} expires {} ({} days)",
                result.instance_id,
                record.status.to_string(),
                record
                    .expiry_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                record.days_to_expiry
            ),
            Err(error) => println!("  {:<12} ERROR    {}", result.instance_id, error),
        }
    }

    if report.failed() > 0 {
        bail!("{} instance(s) failed to refresh", report.failed());
    }
    Ok(())
}

pub async fn get(engine: &SyncEngine, instance: Option<&str>) -> Result<()> {
    let records = match instance {
        Some(id) => match engine.get_record(id).await? {
            Some(record) => vec![record],
            None => {
                bail!("No cached license for instance '{id}'; run 'licwatchctl refresh' first")
            }
        },
        None => engine.list_records().await?,
    };

    if records.is_empty() {
        println!("No license data cached yet. Run 'licwatchctl refresh' first.");
        return Ok(());
    }

    render_records(engine, &records);
    Ok(())
}

fn render_records(engine: &SyncEngine, records: &[LicenseRecord]) {
    println!(
        "{:<12} {:<10} {:<24} {:<16} {:<12} {:>6}  {:<8} {}",
        "INSTANCE", "ENV", "ISSUED TO", "PRODUCT", "EXPIRY", "DAYS", "STATUS", "LAST SYNCED"
    );
    for record in records {
        let environment = engine
            .instances()
            .iter()
            .find(|i| i.id == record.instance_id)
            .map(|i| i.environment.clone())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<10} {:<24} {:<16} {:<12} {:>6}  {:<8} {}",
            record.instance_id,
            environment,
            record.issued_to.as_deref().unwrap_or("-"),
            record.product.as_deref().unwrap_or("-"),
            record
                .expiry_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.days_to_expiry,
            record.status.to_string(),
            record.last_synced_at.format("%Y-%m-%d %H:%M")
        );
    }
}

pub async fn apply(engine: &SyncEngine, instance: &str, file: &Path) -> Result<()> {
    let record = engine
        .apply_license(instance, file, &cli_actor())
        .await
        .with_context(|| format!("Failed to apply license to instance '{instance}'"))?;

    println!("License applied and verified.");
    println!("  Instance:   {}", record.instance_id);
    println!(
        "  New expiry: {}",
        record
            .expiry_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!("  Status:     {}", record.status);
    if record.status != LicenseStatus::Ok {
        println!(
            "  Note: license is {} ({} days to expiry)",
            record.status, record.days_to_expiry
        );
    }
    Ok(())
}

pub async fn audit(engine: &SyncEngine, instance: Option<&str>, since: Option<&str>) -> Result<()> {
    let since = since
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.to_utc())
                .with_context(|| format!("'{s}' is not a valid RFC 3339 timestamp"))
        })
        .transpose()?;

    let filter = AuditFilter {
        instance_id: instance.map(String::from),
        since,
        until: None,
    };
    let entries = engine.list_audits(&filter).await?;

    if entries.is_empty() {
        println!("No audit entries match.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{} {:<12} {:<8} {:?} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.instance_id,
            format!("{:?}", entry.action).to_lowercase(),
            entry.actor,
            entry.details
        );
    }
    Ok(())
}

pub async fn agreement(engine: &SyncEngine, instance: &str, accept: bool) -> Result<()> {
    let agreement = if accept {
        engine.set_agreement(instance, true).await?
    } else {
        engine.agreement(instance).await?
    };
    println!(
        "Agreement on '{}': {}",
        instance,
        if agreement.accepted {
            "accepted"
        } else {
            "not accepted"
        }
    );
    Ok(())
}

pub async fn watch(engine: Arc<SyncEngine>, config: &LicwatchConfig) -> Result<()> {
    if !config.schedule.enabled {
        bail!("Scheduling is disabled in configuration (schedule.enabled = false)");
    }
    let trigger = config.daily_trigger()?;

    let handle = Scheduler::start(engine, trigger);
    println!("Scheduler running; daily sweep at {trigger} UTC. Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    println!("Shutting down...");
    handle.stop().await;
    Ok(())
}
