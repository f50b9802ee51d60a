//! Install state detection

use serde::Serialize;
use tracing::{debug, info};

use crate::env::snapshot::{has_changed, EnvSnapshot};
use crate::env::values::EnvValues;
use crate::storage::layout::StorageLayout;
use crate::storage::version::has_version;

/// What the supervisor has to do before the app can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallState {
    /// No version record: fresh install
    NoVersion,
    /// Installed and the referenced environment is unchanged
    UpToDate,
    /// Installed but a referenced variable drifted: update
    Stale,
}

impl InstallState {
    pub fn needs_install(&self) -> bool {
        !matches!(self, InstallState::UpToDate)
    }

    /// Whether the pipeline runs in update mode for this state
    pub fn is_update(&self) -> bool {
        matches!(self, InstallState::Stale)
    }
}

/// Determine the install state from the version record and environment snapshot
pub async fn determine_state(
    layout: &StorageLayout,
    referenced: &[String],
    current: &EnvValues,
) -> InstallState {
    if !has_version(&layout.version_file()).await {
        info!("No installed version found");
        return InstallState::NoVersion;
    }

    let snapshot = EnvSnapshot::load(&layout.env_snapshot_file()).await;
    if has_changed(referenced, &snapshot, current) {
        return InstallState::Stale;
    }

    debug!("Installed version is up to date");
    InstallState::UpToDate
}
