// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Engine configuration: one `CalDAV` account block per configured
//! account, plus the tuning knobs that apply across all of them.

use std::path::Path;

use calsync_caldav::CalDavConfig;
use thiserror::Error;

use crate::conflict::ConflictStrategy;
use crate::model::Provider;

/// The name this engine identifies itself as in logs and generated files.
pub const APP_NAME: &str = "calsync";

/// Top-level configuration, deserialized from a TOML file.
#[derive(Debug, Clone, serde::Deserialize, Default)]
pub struct Config {
    /// One block per configured account.
    #[serde(default, rename = "account")]
    pub accounts: Vec<AccountConfig>,
    /// One block per ICS subscription.
    #[serde(default, rename = "subscription")]
    pub subscriptions: Vec<SubscriptionConfig>,
    /// Engine-wide tuning that isn't specific to any one account.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// One configured `CalDAV` account.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AccountConfig {
    /// The account's e-mail address, used as its natural key.
    pub email: String,
    /// Recognized provider, selecting a `Quirks` profile. Defaults to
    /// [`Provider::Generic`] for servers without known divergence.
    #[serde(default)]
    pub provider: Provider,
    /// The wire-level `CalDAV` configuration (base URL, auth, timeouts).
    #[serde(flatten)]
    pub caldav: CalDavConfig,
    /// Whether this account participates in sync runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// One configured ICS subscription feed.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SubscriptionConfig {
    /// Feed URL.
    pub url: String,
    /// User-facing name.
    pub name: String,
    /// Display color.
    #[serde(default)]
    pub color: Option<String>,
    /// Poll interval, in hours.
    #[serde(default = "default_subscription_interval_hours")]
    pub sync_interval_hours: u32,
    /// Whether this subscription is actively polled.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Tuning that applies to every account and subscription.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct EngineConfig {
    /// How push-time conflicts between a local pending mutation and the
    /// server's current copy are resolved.
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,
    /// Attempts beyond this transition a pending operation to `Failed`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Full-pull window, days before `now`.
    #[serde(default = "default_pull_window_days_back")]
    pub pull_window_days_back: i64,
    /// Full-pull window, days after `now`.
    #[serde(default = "default_pull_window_days_forward")]
    pub pull_window_days_forward: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            conflict_strategy: ConflictStrategy::default(),
            max_retries: default_max_retries(),
            pull_window_days_back: default_pull_window_days_back(),
            pull_window_days_forward: default_pull_window_days_forward(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_pull_window_days_back() -> i64 {
    365
}

const fn default_pull_window_days_forward() -> i64 {
    730
}

const fn default_subscription_interval_hours() -> u32 {
    6
}

/// Failure to load or parse a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file's contents were not valid TOML, or didn't match the schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Loads configuration from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file can't be read, or
    /// [`ConfigError::Parse`] if it isn't valid TOML matching this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
