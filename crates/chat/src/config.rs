//! Configuration loading for chat services
//!
//! The backend base URL is resolved from (in order of priority):
//! 1. Compile-time embedded URL (for production builds)
//! 2. JSON file (~/.config/souk/souk.json)
//! 3. Runtime environment variable
//! 4. Built-in default

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Config filename in the Souk config directory
const CONFIG_FILE: &str = "souk.json";

const DEFAULT_BASE_URL: &str = "https://api.souk.app/";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Connection settings for the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
    /// API key sent with product searches
    pub client_key: Option<String>,
}

/// On-disk config file format
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    client_key: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            client_key: None,
        }
    }
}

impl ChatConfig {
    /// Load configuration using the following priority:
    /// 1. Compile-time embedded base URL
    /// 2. JSON file (~/.config/souk/souk.json)
    /// 3. Runtime environment variable
    pub fn load() -> Result<Self> {
        if let Some(config) = Self::from_compile_time() {
            return Ok(config);
        }

        if config::config_exists(CONFIG_FILE) {
            let file: ConfigFile = config::load_json(CONFIG_FILE)?;
            return Self::from_config_file(file);
        }

        Self::from_env()
    }

    /// Base URL embedded at compile time.
    /// Build with: SOUK_BASE_URL=https://... cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let base_url = option_env!("SOUK_BASE_URL")?;
        if base_url.is_empty() {
            return None;
        }

        let base_url = Url::parse(base_url).ok()?;
        Some(Self {
            base_url,
            ..Self::default()
        })
    }

    /// Load configuration from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file: ConfigFile = config::load_json_file(path)?;
        Self::from_config_file(file)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json).context("Failed to parse config JSON")?;
        Self::from_config_file(file)
    }

    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();
        if let Some(base_url) = file.base_url {
            config.base_url = Url::parse(&base_url)
                .with_context(|| format!("Invalid baseUrl in config: {}", base_url))?;
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        config.client_key = file.client_key.filter(|key| !key.is_empty());
        Ok(config)
    }

    /// Load from the SOUK_BASE_URL environment variable, else defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var("SOUK_BASE_URL") {
            Ok(base_url) => Ok(Self {
                base_url: Url::parse(&base_url)
                    .with_context(|| format!("Invalid SOUK_BASE_URL: {}", base_url))?,
                ..Self::default()
            }),
            Err(_) => Ok(Self::default()),
        }
    }
}
