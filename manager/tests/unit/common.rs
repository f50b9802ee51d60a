//! Shared fixtures

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use containerizer::deploy::command::{CommandOutput, CommandRunner, ShellCommand};
use containerizer::env::values::EnvValues;
use containerizer::errors::ManagerError;
use containerizer::pipeline::progress::ProgressRecord;
use containerizer::storage::config::Configuration;

pub const HEAD: &str = "4f2d9c1e8b7a6f5e4d3c2b1a0f9e8d7c6b5a4f3e";

/// Records every command instead of running it.
///
/// `git clone` drops a `README.md` into its working directory, `git rev-parse`
/// answers with [`HEAD`], and any command whose rendered line contains
/// `fail_on` exits with code 1. The step number of the progress file is
/// sampled on every call.
pub struct RecordingRunner {
    commands: Mutex<Vec<ShellCommand>>,
    progress_samples: Mutex<Vec<u32>>,
    progress_file: Option<PathBuf>,
    fail_on: Option<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            progress_samples: Mutex::new(Vec::new()),
            progress_file: None,
            fail_on: None,
        }
    }

    pub fn sampling_progress(mut self, progress_file: &Path) -> Self {
        self.progress_file = Some(progress_file.to_path_buf());
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn commands(&self) -> Vec<ShellCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Commands rendered as `program arg arg...`
    pub fn lines(&self) -> Vec<String> {
        self.commands().iter().map(|c| c.to_string()).collect()
    }

    pub fn progress_samples(&self) -> Vec<u32> {
        self.progress_samples.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput, ManagerError> {
        self.commands.lock().unwrap().push(command.clone());

        if let Some(path) = &self.progress_file {
            if let Ok(contents) = std::fs::read_to_string(path) {
                if let Ok(record) = serde_json::from_str::<ProgressRecord>(&contents) {
                    self.progress_samples.lock().unwrap().push(record.step_nr);
                }
            }
        }

        let line = command.to_string();
        if let Some(needle) = &self.fail_on {
            if line.contains(needle.as_str()) {
                return Err(ManagerError::ExternalCommand {
                    command: line,
                    code: Some(1),
                    output: "simulated failure".to_string(),
                });
            }
        }

        if command.program == "git" && command.args.first().map(String::as_str) == Some("clone") {
            std::fs::write(command.cwd.join("README.md"), "# app\n")?;
        }

        if line == "git rev-parse HEAD" {
            return Ok(CommandOutput {
                stdout: format!("{}\n", HEAD),
                stderr: String::new(),
            });
        }

        Ok(CommandOutput::default())
    }
}

/// A configuration cloned into `<base>/work`
pub fn config_json(base: &Path, extra: &str) -> String {
    format!(
        r#"{{
            "repository": "https://github.com/hrueger/app",
            "branch": "main",
            "commit": "",
            "workingDirPath": "{work}",
            "npmInstallDirs": ["api"],
            "filesToCreate": [
                {{
                    "path": "api/src/environment.ts",
                    "template": "typescript",
                    "rootVariableName": "environment",
                    "properties": ["API_URL"],
                    "presetProperties": {{ "production": true }}
                }}
            ],
            "additionalBuilds": [{{ "dir": "api", "command": "npm run build" }}],
            "unnecessaryFilesAndDirs": ["README.md"],
            "startFile": "api/dist/index.js",
            "startCommand": "true",
            "customNgBuildCmd": "npm run build:app"
            {extra}
        }}"#,
        work = base.join("work").display(),
        extra = extra,
    )
}

pub fn config(base: &Path, extra: &str) -> Configuration {
    Configuration::from_json(&config_json(base, extra)).unwrap()
}

pub fn env(pairs: &[(&str, &str)]) -> EnvValues {
    let values: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvValues::from_map(values)
}
