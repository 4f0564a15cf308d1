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

//! Process configuration.
//!
//! Configuration is TOML, loaded once at process start; changing the
//! instance set requires a restart. Resolution order: an explicit path,
//! then the `LICWATCH_CONFIG` environment variable, then the search
//! paths `./licwatch.toml` and `/etc/licwatch/config.toml`.
//!
//! ```toml
//! [storage]
//! url = "/var/lib/licwatch"            # or mongodb://localhost:27017/licwatch
//!
//! [client]
//! timeout_secs = 30
//!
//! [schedule]
//! enabled = true
//! daily_at = "06:00"                   # UTC
//!
//! [[instances]]
//! id = "pf1"
//! display_name = "PingFederate One"
//! environment = "prod"
//! base_url = "http://localhost:8080/pf1"
//! ```

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::models::Instance;
use crate::storage::BackendType;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "LICWATCH_CONFIG";

const SEARCH_PATHS: &[&str] = &["./licwatch.toml", "/etc/licwatch/config.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration file found; searched {searched:?} (set {CONFIG_ENV_VAR} or pass --config)")]
    NotFound { searched: Vec<PathBuf> },

    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

impl ConfigError {
    fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicwatchConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub instances: Vec<Instance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection URL: `mongodb://` / `mongodb+srv://` for the
    /// document store, a directory path for the file store.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-request timeout for endpoint exchanges.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Defaults apply per field, so a `[schedule]` table carrying only
/// `enabled = false` still parses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Whether the daily background sweep runs at all.
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,
    /// Daily trigger time, `HH:MM`, UTC.
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_schedule_enabled(),
            daily_at: default_daily_at(),
        }
    }
}

fn default_schedule_enabled() -> bool {
    true
}

fn default_daily_at() -> String {
    "06:00".to_string()
}

impl LicwatchConfig {
    /// Loads configuration from an explicit path, the `LICWATCH_CONFIG`
    /// environment variable, or the default search paths.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
            PathBuf::from(env_path)
        } else {
            SEARCH_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
                .ok_or_else(|| ConfigError::NotFound {
                    searched: SEARCH_PATHS.iter().map(PathBuf::from).collect(),
                })?
        };
        Self::from_path(&path)
    }

    /// Loads and parses one configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Validates the configuration, failing loudly on anything that
    /// would only surface mid-run otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        BackendType::from_url(&self.storage.url)
            .map_err(|e| ConfigError::invalid(e.to_string()))?;

        self.daily_trigger()?;

        if self.client.timeout_secs == 0 {
            return Err(ConfigError::invalid("client.timeout_secs must be positive"));
        }

        if self.instances.is_empty() {
            return Err(ConfigError::invalid("at least one instance is required"));
        }
        let mut seen = std::collections::HashSet::new();
        for instance in &self.instances {
            if instance.id.is_empty()
                || !instance
                    .id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ConfigError::invalid(format!(
                    "instance id '{}' must be non-empty and contain only [A-Za-z0-9_-]",
                    instance.id
                )));
            }
            if !seen.insert(&instance.id) {
                return Err(ConfigError::invalid(format!(
                    "duplicate instance id '{}'",
                    instance.id
                )));
            }
            Url::parse(&instance.base_url).map_err(|e| {
                ConfigError::invalid(format!(
                    "instance '{}' has invalid base_url '{}': {e}",
                    instance.id, instance.base_url
                ))
            })?;
        }
        Ok(())
    }

    /// The parsed daily trigger time.
    pub fn daily_trigger(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.schedule.daily_at, "%H:%M").map_err(|_| {
            ConfigError::invalid(format!(
                "schedule.daily_at '{}' is not a valid HH:MM time",
                self.schedule.daily_at
            ))
        })
    }
}
