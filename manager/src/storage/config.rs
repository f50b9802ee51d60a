//! Installer configuration (`containerizer.json`)

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ManagerError;
use crate::filesys::file::File;

/// Declarative description of the application to install and run.
///
/// Loaded once at startup and shared read-only with every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Git repository URL
    pub repository: String,

    /// Branch to clone and track
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Pinned commit; empty means "latest commit on the branch"
    #[serde(default)]
    pub commit: String,

    /// Directory the repository is cloned into
    #[serde(alias = "wirkingDirPath")]
    pub working_dir_path: String,

    /// Directories (inside the clone) that need `npm install`
    #[serde(default)]
    pub npm_install_dirs: Vec<String>,

    /// Source files generated from environment variables
    #[serde(default)]
    pub files_to_create: Vec<FileToCreate>,

    /// Extra build commands, run in order after the primary build
    #[serde(default)]
    pub additional_builds: Vec<AdditionalBuild>,

    /// Paths removed after the build
    #[serde(default)]
    pub unnecessary_files_and_dirs: Vec<String>,

    /// Entry point of the managed application
    pub start_file: String,

    /// Program used to run `start_file`
    #[serde(default = "default_start_command")]
    pub start_command: String,

    /// Skip the wipe/reclone and cleanup stages when updating
    #[serde(default = "default_true")]
    pub fast_update_mode: bool,

    /// Source directory of the Angular frontend
    #[serde(default)]
    pub ng_src_dir: Option<String>,

    /// Output directory of the Angular frontend
    #[serde(default)]
    pub ng_dest_dir: Option<String>,

    /// Replaces the templated Angular build command when set
    #[serde(default)]
    pub custom_ng_build_cmd: Option<String>,
}

/// One generated source file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileToCreate {
    /// Target path relative to the working directory
    pub path: String,

    /// Template kind, e.g. `typescript`
    pub template: String,

    /// Name of the exported binding
    pub root_variable_name: String,

    /// Environment variables copied into the object
    #[serde(default)]
    pub properties: Vec<String>,

    /// Fixed key/value pairs
    #[serde(default)]
    pub preset_properties: Map<String, Value>,
}

/// An additional build command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalBuild {
    pub dir: String,
    pub command: String,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_start_command() -> String {
    "node".to_string()
}

fn default_true() -> bool {
    true
}

impl Configuration {
    /// Load and validate the configuration file
    pub async fn load(file: &File) -> Result<Self, ManagerError> {
        if !file.exists().await {
            return Err(ManagerError::ConfigError(format!(
                "Configuration file not found: {:?}",
                file.path()
            )));
        }

        let contents = file.read_string().await.map_err(|e| {
            ManagerError::ConfigError(format!("Failed to read {:?}: {}", file.path(), e))
        })?;

        let config = Self::from_json(&contents)?;
        debug!("Loaded configuration from {:?}", file.path());
        Ok(config)
    }

    /// Parse and validate a configuration document
    pub fn from_json(contents: &str) -> Result<Self, ManagerError> {
        let config: Configuration = serde_json::from_str(contents)
            .map_err(|e| ManagerError::ConfigError(format!("Malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields
    pub fn validate(&self) -> Result<(), ManagerError> {
        let required = [
            ("repository", &self.repository),
            ("branch", &self.branch),
            ("workingDirPath", &self.working_dir_path),
            ("startFile", &self.start_file),
            ("startCommand", &self.start_command),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ManagerError::ConfigError(format!("'{}' must not be empty", name)));
            }
        }

        for build in &self.additional_builds {
            if build.command.trim().is_empty() {
                return Err(ManagerError::ConfigError(format!(
                    "additional build in '{}' has an empty command",
                    build.dir
                )));
            }
        }

        let mut relative_paths: Vec<(&str, &str)> = vec![("startFile", self.start_file.as_str())];
        relative_paths.extend(self.npm_install_dirs.iter().map(|d| ("npmInstallDirs", d.as_str())));
        relative_paths.extend(self.files_to_create.iter().map(|f| ("filesToCreate", f.path.as_str())));
        relative_paths.extend(self.additional_builds.iter().map(|b| ("additionalBuilds", b.dir.as_str())));
        relative_paths.extend(
            self.unnecessary_files_and_dirs
                .iter()
                .map(|p| ("unnecessaryFilesAndDirs", p.as_str())),
        );
        relative_paths.extend(self.ng_src_dir.iter().map(|d| ("ngSrcDir", d.as_str())));
        relative_paths.extend(self.ng_dest_dir.iter().map(|d| ("ngDestDir", d.as_str())));

        for (name, path) in relative_paths {
            if escapes_root(path) {
                return Err(ManagerError::ConfigError(format!(
                    "'{}' entry '{}' leaves the working directory",
                    name, path
                )));
            }
        }

        Ok(())
    }

    /// The configured commit pin, if any
    pub fn pinned_commit(&self) -> Option<&str> {
        let commit = self.commit.trim();
        (!commit.is_empty()).then_some(commit)
    }

    /// Environment variable names referenced by `filesToCreate`, deduplicated
    /// in first-seen order
    pub fn referenced_env_vars(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.files_to_create.iter().flat_map(|f| f.properties.iter()) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Whether a path relative to the working directory climbs out of it
pub fn escapes_root(relative: &str) -> bool {
    Path::new(relative)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}
