use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::stream::StreamMode;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/invoke";
pub const ENDPOINT_ENV: &str = "ADVOCATE_ENDPOINT";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_mode: Option<StreamMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the user config directory. A missing file gives defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Like [`Config::load`], but an unreadable file gives defaults so that
    /// it can be overwritten.
    pub fn load_or_new() -> Result<Self> {
        Ok(Self::load_or_new_from(&Self::get_config_path()?))
    }

    pub fn load_or_new_from(path: &Path) -> Self {
        Self::load_from(path).unwrap_or_else(|e| {
            tracing::warn!("ignoring unreadable config: {}", e);
            Self::new()
        })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply the environment override (`ADVOCATE_ENDPOINT`).
    pub fn with_env(mut self) -> Self {
        if let Some(endpoint) = std::env::var(ENDPOINT_ENV).ok().filter(|e| !e.trim().is_empty()) {
            self.endpoint = Some(endpoint);
        }
        self
    }

    /// Apply overrides given on the command line. `None` keeps the current value.
    pub fn with_overrides(mut self, endpoint: Option<String>, stream_mode: Option<StreamMode>) -> Self {
        if endpoint.is_some() {
            self.endpoint = endpoint;
        }
        if stream_mode.is_some() {
            self.stream_mode = stream_mode;
        }
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn stream_mode(&self) -> StreamMode {
        self.stream_mode.unwrap_or_default()
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("advocate"))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
