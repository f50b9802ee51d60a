//! Package manager and build commands

use std::path::Path;

use tracing::info;

use crate::deploy::command::{CommandRunner, ShellCommand};
use crate::errors::ManagerError;

/// Run `npm install` in `dir`
pub async fn install(runner: &dyn CommandRunner, dir: &Path) -> Result<(), ManagerError> {
    info!("Running \"npm install\" in {:?}", dir);
    runner
        .run(&ShellCommand::new("npm", ["install"], dir))
        .await?;
    Ok(())
}

/// Run an arbitrary build command line in `dir`
pub async fn run_build(runner: &dyn CommandRunner, command_line: &str, dir: &Path) -> Result<(), ManagerError> {
    info!("Running \"{}\" in {:?}", command_line, dir);
    runner.run(&ShellCommand::shell(command_line, dir)).await?;
    Ok(())
}

/// The default Angular production build writing into `dest_dir`
pub fn angular_build_command(dest_dir: Option<&Path>) -> String {
    match dest_dir {
        Some(dest) => format!("npx ng build --prod --output-path={}", dest.display()),
        None => "npx ng build --prod".to_string(),
    }
}
