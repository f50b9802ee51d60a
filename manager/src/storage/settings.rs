//! Runtime settings (`containerizer_settings.json`)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ManagerError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Manager settings. Every field has a default so the file is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Emit JSON logs on stdout
    #[serde(default)]
    pub json_logs: bool,

    /// Progress page listener
    #[serde(default = "default_status_server")]
    pub status_server: ListenerSettings,

    /// Update trigger listener
    #[serde(default = "default_update_server")]
    pub update_server: ListenerSettings,

    /// Enable the update trigger listener
    #[serde(default = "default_true")]
    pub enable_update_server: bool,

    /// Seconds between stopping and restarting the app on manual update
    #[serde(default = "default_restart_grace_secs")]
    pub restart_grace_secs: u64,

    /// Client-side refresh interval of the progress page
    #[serde(default = "default_status_refresh_secs")]
    pub status_refresh_secs: u64,

    /// Base URL of the upstream commit API
    #[serde(default = "default_upstream_api_url")]
    pub upstream_api_url: String,
}

/// Host/port pair for a listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_status_server() -> ListenerSettings {
    ListenerSettings {
        host: default_host(),
        port: 80,
    }
}

fn default_update_server() -> ListenerSettings {
    ListenerSettings {
        host: default_host(),
        port: 8315,
    }
}

fn default_restart_grace_secs() -> u64 {
    5
}

fn default_status_refresh_secs() -> u64 {
    3
}

fn default_upstream_api_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: None,
            json_logs: false,
            status_server: default_status_server(),
            update_server: default_update_server(),
            enable_update_server: true,
            restart_grace_secs: default_restart_grace_secs(),
            status_refresh_secs: default_status_refresh_secs(),
            upstream_api_url: default_upstream_api_url(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is absent
    pub async fn load_or_default(file: &File) -> Result<Self, ManagerError> {
        if !file.exists().await {
            debug!("No settings file at {:?}, using defaults", file.path());
            return Ok(Self::default());
        }

        file.read_json().await.map_err(|e| {
            ManagerError::ConfigError(format!("Invalid settings file {:?}: {}", file.path(), e))
        })
    }
}
