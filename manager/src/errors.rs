//! Error types for the containerizer manager

use thiserror::Error;

/// Main error type for the manager
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported template '{template}' for file {path}")]
    UnsupportedTemplate { template: String, path: String },

    #[error("Command `{command}` failed with exit code {code:?}: {output}")]
    ExternalCommand {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Process error: {0}")]
    ProcessError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("update already in progress")]
    InstallInProgress,

    #[error("Internal error: {0}")]
    Internal(String),
}

