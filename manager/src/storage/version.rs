//! Version record of the installed application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ManagerError;
use crate::filesys::file::File;

/// Written after a fully successful install or update. Its presence is what
/// distinguishes "already installed" from "first run".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    /// Resolved commit hash that was built
    pub commit: String,

    pub repository: String,

    pub branch: String,

    #[serde(default)]
    pub installed_at: Option<DateTime<Utc>>,
}

impl VersionRecord {
    pub fn new(commit: String, repository: String, branch: String) -> Self {
        Self {
            commit,
            repository,
            branch,
            installed_at: Some(Utc::now()),
        }
    }
}

/// Whether a version record is present
pub async fn has_version(version_file: &File) -> bool {
    version_file.exists().await
}

/// Load the version record
pub async fn load_version(version_file: &File) -> Result<VersionRecord, ManagerError> {
    version_file.read_json().await
}

/// Save the version record
pub async fn save_version(version_file: &File, record: &VersionRecord) -> Result<(), ManagerError> {
    version_file.write_json_atomic(record).await
}
