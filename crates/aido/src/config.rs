//! Client configuration: backend location and workspace policy.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::download::DownloadPolicy;
use crate::error::ConfigError;

fn default_true() -> bool {
    true
}

fn default_transcript_fetch_delay_ms() -> u64 {
    1_000
}

fn default_status_refresh_secs() -> u64 {
    10
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Client configuration, loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    /// Base URL of the Aido backend.
    pub base_url: String,
    /// Directory where downloaded artifacts are written.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Auto-download the generated DOCX when a document becomes ready.
    #[serde(default = "default_true")]
    pub auto_download_manual: bool,
    /// Auto-download the transcript when a document becomes ready.
    #[serde(default = "default_true")]
    pub auto_download_transcript: bool,
    /// Delay before the secondary transcript fetch after a run completes.
    #[serde(default = "default_transcript_fetch_delay_ms")]
    pub transcript_fetch_delay_ms: u64,
    /// Interval between system status refreshes.
    #[serde(default = "default_status_refresh_secs")]
    pub status_refresh_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            download_dir: default_download_dir(),
            auto_download_manual: true,
            auto_download_transcript: true,
            transcript_fetch_delay_ms: default_transcript_fetch_delay_ms(),
            status_refresh_secs: default_status_refresh_secs(),
        }
    }
}

impl ClientConfig {
    pub fn transcript_fetch_delay(&self) -> Duration {
        Duration::from_millis(self.transcript_fetch_delay_ms)
    }

    pub fn status_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.status_refresh_secs)
    }

    pub fn download_policy(&self) -> DownloadPolicy {
        DownloadPolicy {
            auto_download_manual: self.auto_download_manual,
            auto_download_transcript: self.auto_download_transcript,
        }
    }
}

/// Loads and validates configuration from a JSON file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates configuration from a JSON string.
pub fn load_config_from_str(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.base_url.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "base_url must not be empty".to_string(),
        });
    }
    if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
        return Err(ConfigError::Validation {
            message: format!("base_url must be an http(s) URL, got '{}'", config.base_url),
        });
    }
    if config.status_refresh_secs == 0 {
        return Err(ConfigError::Validation {
            message: "status_refresh_secs must be at least 1".to_string(),
        });
    }
    Ok(())
}
