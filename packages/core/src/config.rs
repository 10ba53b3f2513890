//! Runtime hierarchy configuration
//!
//! HierarchyConfig is the single source of truth for how the store talks to
//! its database. It can be deserialized from a settings file, and
//! `from_env()` overlays process environment variables on top of the
//! defaults (the same variables the dev tools read).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default SQLite busy timeout in milliseconds
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Default number of re-executions for transient mutation failures
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Default backoff before the first retry (doubles on each attempt)
pub const DEFAULT_RETRY_BASE_MS: u64 = 10;

/// Runtime configuration for the hierarchy store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HierarchyConfig {
    /// Path to the libsql database file
    pub database_path: PathBuf,

    /// How long a connection waits on a locked database before failing
    pub busy_timeout_ms: u64,

    /// Run full validation inside every mutation transaction before commit
    pub verify_mutations: bool,

    /// Re-executions allowed for busy/locked failures
    pub max_retries: usize,

    /// Backoff before the first retry
    pub retry_base_ms: u64,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("canopy.db"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            verify_mutations: true,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
        }
    }
}

impl HierarchyConfig {
    /// Default configuration pointed at `database_path`
    pub fn with_database_path(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    /// Build configuration from environment variables
    ///
    /// - `HIERARCHY_DB_PATH`: database file
    /// - `HIERARCHY_BUSY_TIMEOUT_MS`: busy timeout
    /// - `HIERARCHY_VERIFY_MUTATIONS`: `true`/`false`/`1`/`0`
    /// - `HIERARCHY_MAX_RETRIES`: transient retry budget
    /// - `HIERARCHY_RETRY_BASE_MS`: first retry backoff
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("HIERARCHY_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(ms) = lookup("HIERARCHY_BUSY_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.busy_timeout_ms = ms;
        }
        if let Some(verify) = lookup("HIERARCHY_VERIFY_MUTATIONS").and_then(|v| parse_flag(&v)) {
            config.verify_mutations = verify;
        }
        if let Some(retries) = lookup("HIERARCHY_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            config.max_retries = retries;
        }
        if let Some(ms) = lookup("HIERARCHY_RETRY_BASE_MS").and_then(|v| v.parse().ok()) {
            config.retry_base_ms = ms;
        }

        config
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
