//! Storage layout configuration

use std::path::{Path, PathBuf};

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Well-known files the manager keeps next to its configuration
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the configuration file path
    pub fn config_file(&self) -> File {
        File::new(self.base_dir.join("containerizer.json"))
    }

    /// Get the runtime settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("containerizer_settings.json"))
    }

    /// Get the version record file path
    pub fn version_file(&self) -> File {
        File::new(self.base_dir.join("containerizer_client_app_version.json"))
    }

    /// Get the progress record file path
    pub fn progress_file(&self) -> File {
        File::new(self.base_dir.join("containerizer_status.json"))
    }

    /// Get the environment snapshot file path
    pub fn env_snapshot_file(&self) -> File {
        File::new(self.base_dir.join("containerizer_env_cache.json"))
    }

    /// Resolve the working directory. Relative paths are taken from the base directory.
    pub fn working_dir(&self, working_dir_path: &str) -> Dir {
        let path = Path::new(working_dir_path);
        if path.is_absolute() {
            Dir::new(path)
        } else {
            Dir::new(self.base_dir.join(path))
        }
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new(".")
    }
}
