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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "licwatchctl",
    version,
    about = "License fleet synchronization and status tracking",
    long_about = "Fetches, classifies, caches, and audits license state across a fleet of \
                  license-bearing endpoints"
)]
pub struct Cli {
    /// Path to the configuration file (defaults to LICWATCH_CONFIG or
    /// ./licwatch.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Refresh license state for every configured instance
    Refresh,

    /// Show cached license status for one instance or the whole fleet
    Get {
        /// Specific instance id; omit for all instances
        #[arg(long)]
        instance: Option<String>,
    },

    /// Apply a license file to an instance and verify the endpoint
    /// serves it
    Apply {
        /// Target instance id
        #[arg(long)]
        instance: String,

        /// Path to the license file
        #[arg(long)]
        file: PathBuf,
    },

    /// Query the audit trail
    Audit {
        /// Restrict to one instance
        #[arg(long)]
        instance: Option<String>,

        /// Only entries at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<String>,
    },

    /// Read or accept the license agreement on an instance
    Agreement {
        /// Target instance id
        #[arg(long)]
        instance: String,

        /// Accept the agreement instead of just reading it
        #[arg(long)]
        accept: bool,
    },

    /// Run the daily scheduler in the foreground until interrupted
    Watch,
}
