//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Default remote API URL (can be overridden at compile time via HEARTH_REMOTE_URL).
pub const DEFAULT_REMOTE_URL: &str = match option_env!("HEARTH_REMOTE_URL") {
    Some(url) => url,
    None => "https://hearth.example.supabase.co",
};

/// Default remote publishable key (overridable at compile time via HEARTH_REMOTE_KEY).
pub const DEFAULT_REMOTE_KEY: &str = match option_env!("HEARTH_REMOTE_KEY") {
    Some(key) => key,
    None => "public-anon-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Sync engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Remote store API URL.
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
    /// Remote publishable API key (public, safe to expose).
    #[serde(default = "default_remote_key")]
    pub remote_key: String,
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

fn default_remote_key() -> String {
    DEFAULT_REMOTE_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            remote_key: DEFAULT_REMOTE_KEY.to_string(),
        }
    }
}

impl Config {
    /// Creates a config from defaults, then applies environment overrides.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Applies `HEARTH_LOG_LEVEL`, `HEARTH_REMOTE_URL`, and
    /// `HEARTH_REMOTE_KEY` environment overrides when set and non-empty.
    pub fn load_from_env(&mut self) {
        if let Some(level) = non_empty_env("HEARTH_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = non_empty_env("HEARTH_REMOTE_URL") {
            self.remote_url = url;
        }
        if let Some(key) = non_empty_env("HEARTH_REMOTE_KEY") {
            self.remote_key = key;
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
