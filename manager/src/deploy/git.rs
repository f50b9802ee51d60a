//! Git operations on the working directory

use std::path::Path;

use tracing::{debug, info};

use crate::deploy::command::{CommandRunner, ShellCommand};
use crate::errors::ManagerError;

/// Clone `repo_url` at `branch` into `target_dir` (which must exist and be empty)
pub async fn clone(
    runner: &dyn CommandRunner,
    repo_url: &str,
    branch: &str,
    target_dir: &Path,
) -> Result<(), ManagerError> {
    info!("Cloning {} using branch {}", repo_url, branch);
    runner
        .run(&ShellCommand::new(
            "git",
            ["clone", "-b", branch, repo_url, "."],
            target_dir,
        ))
        .await?;
    Ok(())
}

/// Bring an existing clone up to the tip of `branch`
pub async fn pull(runner: &dyn CommandRunner, branch: &str, repo_dir: &Path) -> Result<(), ManagerError> {
    info!("Pulling latest changes of branch {}", branch);

    // A previous pinned checkout leaves HEAD detached
    runner
        .run(&ShellCommand::new("git", ["checkout", branch], repo_dir))
        .await?;
    runner
        .run(&ShellCommand::new("git", ["pull", "origin", branch], repo_dir))
        .await?;
    Ok(())
}

/// Check out a specific commit
pub async fn checkout(runner: &dyn CommandRunner, commit: &str, repo_dir: &Path) -> Result<(), ManagerError> {
    info!("Checking out at commit {}", commit);
    runner
        .run(&ShellCommand::new("git", ["checkout", commit], repo_dir))
        .await?;
    Ok(())
}

/// Resolve the commit hash currently checked out
pub async fn resolve_head(runner: &dyn CommandRunner, repo_dir: &Path) -> Result<String, ManagerError> {
    let output = runner
        .run(&ShellCommand::new("git", ["rev-parse", "HEAD"], repo_dir))
        .await?;

    let hash = output.stdout.trim().to_string();
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ManagerError::ExternalCommand {
            command: "git rev-parse HEAD".to_string(),
            code: Some(0),
            output: format!("unexpected output: {:?}", output.stdout),
        });
    }

    debug!("Resolved HEAD to {}", hash);
    Ok(hash)
}
