//! Store configuration
//!
//! Settings are resolved in this order:
//! 1. JSON file (`~/.config/mailstore/store.json`)
//! 2. Environment variables (`MAILSTORE_PATH`, `MAILSTORE_BUCKET`,
//!    `MAILSTORE_OPEN_TIMEOUT_MS`)
//! 3. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config filename in the mailstore config directory
const CONFIG_FILE: &str = "store.json";

/// Database filename used when no path is configured
const DEFAULT_DB_FILE: &str = "mailstore.sqlite";

/// Name of the namespace that mirrors every stored message
pub const DEFAULT_BUCKET: &str = "default";

const DEFAULT_OPEN_TIMEOUT_MS: u64 = 1000;

const ENV_PATH: &str = "MAILSTORE_PATH";
const ENV_BUCKET: &str = "MAILSTORE_BUCKET";
const ENV_OPEN_TIMEOUT: &str = "MAILSTORE_OPEN_TIMEOUT_MS";

/// Settings for opening a [`SqliteMessageStore`](crate::storage::SqliteMessageStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file
    pub path: PathBuf,
    /// Mirror namespace, created on open
    pub bucket: String,
    /// How long to wait for the database lock before giving up
    pub open_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: config::config_path(DEFAULT_DB_FILE)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE)),
            bucket: DEFAULT_BUCKET.to_string(),
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Defaults with an explicit database path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    /// Load the config file if present, otherwise fall back to the environment
    pub fn load() -> Result<Self> {
        if config::config_exists(CONFIG_FILE) {
            return config::load_json(CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse settings from a JSON string; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse store config JSON")
    }

    /// Defaults overridden by `MAILSTORE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut store_config = Self::default();

        if let Some(path) = lookup(ENV_PATH) {
            store_config.path = PathBuf::from(path);
        }
        if let Some(bucket) = lookup(ENV_BUCKET) {
            store_config.bucket = bucket;
        }
        if let Some(timeout) = lookup(ENV_OPEN_TIMEOUT) {
            store_config.open_timeout_ms = timeout
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds", ENV_OPEN_TIMEOUT))?;
        }

        Ok(store_config)
    }

    /// Write these settings to the config directory, returning the file path
    pub fn save(&self) -> Result<PathBuf> {
        config::save_json(CONFIG_FILE, self)
    }

    /// Default config file path (`~/.config/mailstore/store.json`)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }
}
