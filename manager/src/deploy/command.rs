//! External command execution

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use crate::errors::ManagerError;

/// Bytes of captured output kept in error messages
const OUTPUT_TAIL_LEN: usize = 4000;

/// A program invocation with its working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl ShellCommand {
    pub fn new<I, S>(program: &str, args: I, cwd: &Path) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.to_path_buf(),
        }
    }

    /// Run a command line through `sh -c`
    pub fn shell(command_line: &str, cwd: &Path) -> Self {
        Self::new("sh", ["-c", command_line], cwd)
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external tools. A non-zero exit is reported as
/// [`ManagerError::ExternalCommand`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput, ManagerError>;
}

/// Runs commands as real child processes and waits for them, without timeout
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput, ManagerError> {
        debug!("Running `{}` in {:?}", command, command.cwd);

        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .output()
            .await
            .map_err(|e| ManagerError::ExternalCommand {
                command: command.to_string(),
                code: None,
                output: format!("failed to spawn: {}", e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let combined = format!("{}{}", stdout, stderr);
            error!("`{}` exited with {}", command, output.status);
            return Err(ManagerError::ExternalCommand {
                command: command.to_string(),
                code: output.status.code(),
                output: tail(&combined, OUTPUT_TAIL_LEN).to_string(),
            });
        }

        debug!("`{}` finished: {}", command, tail(stdout.trim(), 500));
        Ok(CommandOutput { stdout, stderr })
    }
}

fn tail(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut start = text.len() - max_len;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
