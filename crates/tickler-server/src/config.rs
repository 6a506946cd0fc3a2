//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the daemon can start with zero
//! configuration for local use.

use std::path::PathBuf;
use std::time::Duration;

use tickler_shared::constants::{DEFAULT_DELIVERY_TIMEOUT_SECS, DEFAULT_DISPATCH_INTERVAL_MS};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `None`, the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Sleep between dispatcher scans.
    /// Env: `DISPATCH_INTERVAL_MS`
    /// Default: 1000 ms
    pub dispatch_interval: Duration,

    /// Upper bound on a single notification delivery.
    /// Env: `DELIVERY_TIMEOUT_SECS`
    /// Default: 30 s
    pub delivery_timeout: Duration,

    /// Chat bridge endpoint that receives reminders as JSON.
    /// Env: `NOTIFY_WEBHOOK_URL`
    /// Default: unset, reminders are only logged.
    pub notify_webhook_url: Option<String>,

    /// Wrap the store in the process-local read-through cache.
    /// Env: `READ_CACHE` (true/false)
    /// Default: `true`
    pub read_cache: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            dispatch_interval: Duration::from_millis(DEFAULT_DISPATCH_INTERVAL_MS),
            delivery_timeout: Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECS),
            notify_webhook_url: None,
            read_cache: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = var("DATABASE_PATH").filter(|p| !p.is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(ms) = parse_positive(&var, "DISPATCH_INTERVAL_MS") {
            config.dispatch_interval = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_positive(&var, "DELIVERY_TIMEOUT_SECS") {
            config.delivery_timeout = Duration::from_secs(secs);
        }

        if let Some(url) = var("NOTIFY_WEBHOOK_URL") {
            if url.starts_with("http://") || url.starts_with("https://") {
                config.notify_webhook_url = Some(url);
            } else if !url.is_empty() {
                tracing::warn!(value = %url, "Invalid NOTIFY_WEBHOOK_URL, reminders will only be logged");
            }
        }

        if let Some(val) = var("READ_CACHE") {
            config.read_cache = val != "false" && val != "0";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

fn parse_positive(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = var(key)?;
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
