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

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use licwatch::client::EndpointClient;
use licwatch::config::LicwatchConfig;
use licwatch::engine::SyncEngine;
use licwatch::notifier::LogNotifier;
use licwatch::storage::Storage;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = LicwatchConfig::load(cli.config.as_deref())?;
    config.validate()?;

    let storage = Storage::connect(&config.storage.url).await?;
    debug!(
        backend = ?storage.backend(),
        instances = config.instances.len(),
        "Configuration loaded and storage connected"
    );
    let client = EndpointClient::new(config.client.timeout_secs)?;
    let engine = Arc::new(SyncEngine::new(
        config.instances.clone(),
        client,
        storage,
        Arc::new(LogNotifier),
    ));

    match &cli.command {
        Commands::Refresh => commands::refresh(&engine).await,
        Commands::Get { instance } => commands::get(&engine, instance.as_deref()).await,
        Commands::Apply { instance, file } => commands::apply(&engine, instance, file).await,
        Commands::Audit { instance, since } => {
            commands::audit(&engine, instance.as_deref(), since.as_deref()).await
        }
        Commands::Agreement { instance, accept } => {
            commands::agreement(&engine, instance, *accept).await
        }
        Commands::Watch => commands::watch(Arc::clone(&engine), &config).await,
    }
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
