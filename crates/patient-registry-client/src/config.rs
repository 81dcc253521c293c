//! Client configuration loading.
//!
//! Precedence: command-line flags and environment (resolved by clap), then
//! the optional TOML file, then defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

/// Default location of the device-local state database.
pub const DEFAULT_STATE_PATH: &str = "patient-registry.db";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no directory service URL configured (set api_url or PATIENT_REGISTRY_API_URL)")]
    MissingApiUrl,
    #[error("invalid directory service URL {url:?}: {reason}")]
    InvalidApiUrl { url: String, reason: String },
    #[error("timeout must be at least one second")]
    InvalidTimeout,
}

/// Partial configuration, as found in a file or on the command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    /// Base URL of the Patient Directory Service.
    pub api_url: Option<String>,
    /// Path to the SQLite file holding device-local state.
    pub state_path: Option<PathBuf>,
    /// HTTP request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Emit JSON log lines.
    pub log_json: Option<bool>,
}

impl ConfigLayer {
    /// Load a layer from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let layer: ConfigLayer = toml::from_str(&content)?;
        Ok(layer)
    }

    /// Fill unset fields from `lower`.
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            api_url: self.api_url.or(lower.api_url),
            state_path: self.state_path.or(lower.state_path),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
            log_json: self.log_json.or(lower.log_json),
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, without a trailing slash.
    pub api_url: Url,
    pub state_path: PathBuf,
    pub timeout: Duration,
    pub log_json: bool,
}

impl ClientConfig {
    /// Resolve a layer into a complete configuration.
    pub fn resolve(layer: ConfigLayer) -> Result<Self, ConfigError> {
        let raw = layer
            .api_url
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::MissingApiUrl)?;
        let api_url = parse_api_url(&raw)?;

        let timeout_secs = layer.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(Self {
            api_url,
            state_path: layer
                .state_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
            timeout: Duration::from_secs(timeout_secs),
            log_json: layer.log_json.unwrap_or(false),
        })
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidApiUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim().trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {}", other))),
    }
}
