//! Shape of an install or update run

/// One reported stage of the install pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CleanWorkspace,
    CreateWorkspace,
    Clone,
    Pull,
    Checkout,
    InstallDependencies,
    GenerateFiles,
    BuildApp,
    AdditionalBuilds,
    Prune,
}

impl Stage {
    /// Status text shown while the stage runs
    pub fn status_text(&self) -> &'static str {
        match self {
            Stage::CleanWorkspace => "Cleaning workspace",
            Stage::CreateWorkspace => "Creating workspace",
            Stage::Clone => "Cloning repository",
            Stage::Pull => "Pulling latest changes",
            Stage::Checkout => "Checking out commit",
            Stage::InstallDependencies => "Installing dependencies",
            Stage::GenerateFiles => "Creating files",
            Stage::BuildApp => "Building application",
            Stage::AdditionalBuilds => "Running additional builds",
            Stage::Prune => "Removing unnecessary files",
        }
    }
}

/// Ordered stages of one run.
///
/// The total step count reported to the progress page is the number of
/// stages, so it always matches the status calls made by the installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub updating: bool,
    pub stages: Vec<Stage>,
}

impl InstallPlan {
    pub fn new(fast_update_mode: bool, updating: bool) -> Self {
        let fast = updating && fast_update_mode;

        let stages = if fast {
            vec![
                Stage::Pull,
                Stage::InstallDependencies,
                Stage::GenerateFiles,
                Stage::BuildApp,
                Stage::AdditionalBuilds,
            ]
        } else {
            vec![
                Stage::CleanWorkspace,
                Stage::CreateWorkspace,
                Stage::Clone,
                Stage::Checkout,
                Stage::InstallDependencies,
                Stage::GenerateFiles,
                Stage::BuildApp,
                Stage::AdditionalBuilds,
                Stage::Prune,
            ]
        };

        Self { updating, stages }
    }

    pub fn total_steps(&self) -> u32 {
        self.stages.len() as u32
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}
