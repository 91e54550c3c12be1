// restorectl/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const SERVER_URL_ENV: &str = "RESTORECTL_SERVER_URL";

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_MAX_OUTPUT_LENGTH: usize = 8192;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SETTINGS_PATH: &str = "restorectl-settings.json";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub server_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub max_output_length: Option<usize>,
    pub truncate_output: Option<bool>,
    pub request_timeout_secs: Option<u64>,
    pub settings_path: Option<PathBuf>,
}

/// Limits applied to the stdout/stderr buffers of a watched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub max_length: usize,
    pub truncate: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            max_length: DEFAULT_MAX_OUTPUT_LENGTH,
            truncate: true,
        }
    }
}

// Application's internal configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_url: Url,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub output: OutputConfig,
    pub settings_path: PathBuf,
}

impl AppConfig {
    /// Loads `config_path` if it exists. A missing file is accepted as long as the
    /// server URL is supplied through the environment.
    pub fn load(config_path: &Path) -> Result<Self> {
        let raw = if config_path.exists() {
            let config_content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
            serde_json::from_str::<RawJsonConfig>(&config_content).with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?
        } else {
            tracing::debug!("Config file {} not found, using defaults", config_path.display());
            RawJsonConfig::default()
        };

        Self::from_raw(raw, env::var(SERVER_URL_ENV).ok())
    }

    pub fn from_raw(raw: RawJsonConfig, server_url_override: Option<String>) -> Result<Self> {
        let server_url = server_url_override
            .filter(|s| !s.trim().is_empty())
            .or(raw.server_url)
            .context(format!(
                "server_url must be set in config.json or through {}",
                SERVER_URL_ENV
            ))?;
        let server_url = Url::parse(server_url.trim())
            .with_context(|| format!("Invalid server_url: {}", server_url))?;
        if !matches!(server_url.scheme(), "http" | "https") {
            anyhow::bail!("server_url must use http or https, got {}", server_url.scheme());
        }

        let poll_interval_ms = raw.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        if poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }

        let max_length = raw.max_output_length.unwrap_or(DEFAULT_MAX_OUTPUT_LENGTH);
        if max_length == 0 {
            anyhow::bail!("max_output_length must be greater than zero");
        }

        let settings_path = raw
            .settings_path
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));

        Ok(AppConfig {
            server_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_secs(
                raw.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            output: OutputConfig {
                max_length,
                truncate: raw.truncate_output.unwrap_or(true),
            },
            settings_path,
        })
    }
}
