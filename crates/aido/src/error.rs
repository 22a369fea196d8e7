//! Top-level error types for the Aido client.

use std::path::PathBuf;

use thiserror::Error;

pub use crate::api::ApiError;
pub use crate::download::DownloadError;
pub use crate::pipeline::{DecodeError, PipelineError};

/// Aggregate error covering every client operation.
#[derive(Error, Debug)]
pub enum AidoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),
}

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AidoError>;
