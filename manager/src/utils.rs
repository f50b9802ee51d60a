//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: stamped(option_env!("GIT_HASH")),
        build_time: stamped(option_env!("BUILD_TIME")),
    }
}

/// A build-time value, `unknown` when missing or blank
fn stamped(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
