//! Application configuration options

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::{ListenerSettings, Settings};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Progress page listener
    pub status_server: ServerOptions,

    /// Enable the update endpoint
    pub enable_update_server: bool,

    /// Update endpoint listener
    pub update_server: ServerOptions,

    /// Client-side refresh interval of the progress page
    pub status_refresh: Duration,

    /// Base URL of the upstream commit API
    pub upstream_api_url: String,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), StorageLayout::default())
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        Self {
            layout,
            lifecycle: LifecycleOptions {
                restart_grace: Duration::from_secs(settings.restart_grace_secs),
                ..Default::default()
            },
            status_server: ServerOptions::from(&settings.status_server),
            enable_update_server: settings.enable_update_server,
            update_server: ServerOptions::from(&settings.update_server),
            status_refresh: Duration::from_secs(settings.status_refresh_secs),
            upstream_api_url: settings.upstream_api_url.clone(),
        }
    }
}

/// Lifecycle options for the manager
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Time the managed app gets to exit after the termination signal
    pub restart_grace: Duration,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            restart_grace: Duration::from_secs(5),
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl ServerOptions {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&ListenerSettings> for ServerOptions {
    fn from(settings: &ListenerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
        }
    }
}
