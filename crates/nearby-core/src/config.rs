//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which holds the cloud function server, its credentials, and the refresh
//! interval for nearby friends.
//!
//! Configuration is stored at `~/.config/nearby/config.json`. Environment
//! variables override values from the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "nearby";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default refresh interval in seconds.
/// Friends move slowly enough that half a minute keeps the list current.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

/// Default cloud function server
const DEFAULT_SERVER_URL: &str = "https://api.parse.com/1";

const ENV_SERVER_URL: &str = "NEARBY_SERVER_URL";
const ENV_APPLICATION_ID: &str = "NEARBY_APPLICATION_ID";
const ENV_REST_API_KEY: &str = "NEARBY_REST_API_KEY";
const ENV_SESSION_TOKEN: &str = "NEARBY_SESSION_TOKEN";

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub rest_api_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            application_id: None,
            rest_api_key: None,
            session_token: None,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Write the config file, returning where it was written
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Override file values with whatever `lookup` finds for the `NEARBY_*` variables
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_SERVER_URL) {
            self.server_url = url;
        }
        if let Some(id) = lookup(ENV_APPLICATION_ID) {
            self.application_id = Some(id);
        }
        if let Some(key) = lookup(ENV_REST_API_KEY) {
            self.rest_api_key = Some(key);
        }
        if let Some(token) = lookup(ENV_SESSION_TOKEN) {
            self.session_token = Some(token);
        }
    }

    /// Refresh interval for the friend visibility cache. Zero is bumped to one second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
