//! Install/update orchestration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::deploy::command::CommandRunner;
use crate::deploy::{git, npm, template};
use crate::env::values::EnvValues;
use crate::errors::ManagerError;
use crate::filesys::dir::{remove_path, Dir};
use crate::filesys::file::File;
use crate::installer::plan::{InstallPlan, Stage};
use crate::pipeline::progress::ProgressTracker;
use crate::pipeline::{self, Task};
use crate::storage::config::{escapes_root, Configuration};
use crate::storage::layout::StorageLayout;
use crate::storage::version::{save_version, VersionRecord};

/// Result of a swallowed install run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(VersionRecord),
    Failed(String),
}

impl InstallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InstallOutcome::Installed(_))
    }
}

/// Builds and runs the install pipeline for a configuration.
///
/// Not reentrant: callers must not start a second run while one is in flight.
pub struct Installer {
    config: Arc<Configuration>,
    layout: StorageLayout,
    runner: Arc<dyn CommandRunner>,
}

/// Everything a stage action needs, shared by all closures of one run
struct RunContext {
    config: Arc<Configuration>,
    runner: Arc<dyn CommandRunner>,
    working_dir: Dir,
    env: EnvValues,
    tracker: ProgressTracker,
}

impl RunContext {
    /// Resolve a configured path inside the working directory. Leading slashes
    /// are ignored and `..` components are rejected.
    fn inside(&self, relative: &str) -> Result<PathBuf, ManagerError> {
        inside(self.working_dir.path(), relative)
    }
}

fn inside(root: &Path, relative: &str) -> Result<PathBuf, ManagerError> {
    if escapes_root(relative) {
        return Err(ManagerError::ConfigError(format!(
            "path '{}' leaves the working directory",
            relative
        )));
    }
    Ok(root.join(relative.trim_start_matches(['/', '\\'])))
}

impl Installer {
    pub fn new(
        config: Arc<Configuration>,
        layout: StorageLayout,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            layout,
            runner,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn plan(&self, updating: bool) -> InstallPlan {
        InstallPlan::new(self.config.fast_update_mode, updating)
    }

    /// Run the install and swallow any failure, so the caller keeps serving
    /// status and update requests.
    pub async fn run(&self, updating: bool, env: &EnvValues) -> InstallOutcome {
        match self.install(updating, env).await {
            Ok(record) => InstallOutcome::Installed(record),
            Err(e) => {
                error!(
                    "{} failed: {}",
                    if updating { "Update" } else { "Installation" },
                    e
                );
                InstallOutcome::Failed(e.to_string())
            }
        }
    }

    /// Rewind the progress file to step 0 of the plan, so a page served
    /// before the first stage reports does not show the previous run.
    pub async fn reset_progress(&self, updating: bool) -> Result<(), ManagerError> {
        let plan = self.plan(updating);
        let text = plan
            .stages
            .first()
            .map(|stage| stage.status_text())
            .unwrap_or("Starting...");
        ProgressTracker::new(self.layout.progress_file())
            .set_status(0, plan.total_steps(), text)
            .await
    }

    /// Run every stage of the plan, then record the resolved commit
    pub async fn install(&self, updating: bool, env: &EnvValues) -> Result<VersionRecord, ManagerError> {
        let plan = self.plan(updating);
        info!(
            "Starting {} ({} steps)",
            if updating { "update" } else { "installation" },
            plan.total_steps()
        );

        let ctx = Arc::new(RunContext {
            config: self.config.clone(),
            runner: self.runner.clone(),
            working_dir: self.layout.working_dir(&self.config.working_dir_path),
            env: env.clone(),
            tracker: ProgressTracker::new(self.layout.progress_file()),
        });

        let tree = build_pipeline(&plan, ctx.clone());
        pipeline::run(&tree).await?;

        let commit = git::resolve_head(ctx.runner.as_ref(), ctx.working_dir.path()).await?;
        let record = VersionRecord::new(
            commit,
            self.config.repository.clone(),
            self.config.branch.clone(),
        );
        save_version(&self.layout.version_file(), &record).await?;

        ctx.tracker
            .set_status(plan.total_steps(), plan.total_steps(), "Finished!")
            .await?;
        info!("Installed commit {}", record.commit);
        Ok(record)
    }
}

fn build_pipeline(plan: &InstallPlan, ctx: Arc<RunContext>) -> Task {
    let total = plan.total_steps();
    let stages = plan
        .stages
        .iter()
        .enumerate()
        .map(|(index, stage)| {
            let mut children = vec![report(&ctx, index as u32, total, *stage)];
            children.extend(stage_tasks(*stage, &ctx));
            Task::pipeline(stage.status_text(), children)
        })
        .collect();

    let label = if plan.updating { "Update" } else { "Installation" };
    Task::pipeline(label, stages)
}

fn report(ctx: &Arc<RunContext>, step_nr: u32, total: u32, stage: Stage) -> Task {
    let ctx = ctx.clone();
    Task::step(format!("Report: {}", stage.status_text()), move || {
        let ctx = ctx.clone();
        async move {
            ctx.tracker
                .set_status(step_nr, total, stage.status_text())
                .await
        }
    })
}

fn stage_tasks(stage: Stage, ctx: &Arc<RunContext>) -> Vec<Task> {
    match stage {
        Stage::CleanWorkspace => vec![action(ctx, "Delete working directory", |ctx| async move {
            ctx.working_dir.delete().await
        })],

        Stage::CreateWorkspace => vec![action(ctx, "Create working directory", |ctx| async move {
            ctx.working_dir.create().await
        })],

        Stage::Clone => vec![action(ctx, "git clone", |ctx| async move {
            git::clone(
                ctx.runner.as_ref(),
                &ctx.config.repository,
                &ctx.config.branch,
                ctx.working_dir.path(),
            )
            .await
        })],

        Stage::Pull => vec![action(ctx, "git pull", |ctx| async move {
            git::pull(ctx.runner.as_ref(), &ctx.config.branch, ctx.working_dir.path()).await?;
            // A pinned commit wins over the branch tip even in fast update mode
            if let Some(commit) = ctx.config.pinned_commit() {
                git::checkout(ctx.runner.as_ref(), commit, ctx.working_dir.path()).await?;
            }
            Ok::<(), ManagerError>(())
        })],

        Stage::Checkout => vec![action(ctx, "git checkout", |ctx| async move {
            match ctx.config.pinned_commit() {
                Some(commit) => {
                    git::checkout(ctx.runner.as_ref(), commit, ctx.working_dir.path()).await
                }
                None => {
                    info!("Checking out at latest commit");
                    Ok(())
                }
            }
        })],

        Stage::InstallDependencies => ctx
            .config
            .npm_install_dirs
            .iter()
            .map(|dir| {
                let dir = dir.clone();
                action(ctx, format!("npm install in /{}", dir), move |ctx| {
                    let dir = dir.clone();
                    async move { npm::install(ctx.runner.as_ref(), &ctx.inside(&dir)?).await }
                })
            })
            .collect(),

        Stage::GenerateFiles => (0..ctx.config.files_to_create.len())
            .map(|index| {
                let label = format!("Create {}", ctx.config.files_to_create[index].path);
                action(ctx, label, move |ctx| async move {
                    let entry = &ctx.config.files_to_create[index];
                    let source = template::render(entry, &ctx.env)?;
                    File::new(ctx.inside(&entry.path)?).write_string(&source).await?;
                    info!("Created {}", entry.path);
                    Ok::<(), ManagerError>(())
                })
            })
            .collect(),

        Stage::BuildApp => vec![action(ctx, "Build application", |ctx| async move {
            build_app(&ctx).await
        })],

        Stage::AdditionalBuilds => (0..ctx.config.additional_builds.len())
            .map(|index| {
                let build = &ctx.config.additional_builds[index];
                let label = format!("{} in /{}", build.command, build.dir);
                action(ctx, label, move |ctx| async move {
                    let build = &ctx.config.additional_builds[index];
                    npm::run_build(ctx.runner.as_ref(), &build.command, &ctx.inside(&build.dir)?).await
                })
            })
            .collect(),

        Stage::Prune => ctx
            .config
            .unnecessary_files_and_dirs
            .iter()
            .map(|path| {
                let path = path.clone();
                action(ctx, format!("Remove {}", path), move |ctx| {
                    let path = path.clone();
                    async move {
                        info!("Removing {}", path);
                        remove_path(&ctx.inside(&path)?).await
                    }
                })
            })
            .collect(),
    }
}

/// Wrap an async closure over the shared run context into a step
fn action<F, Fut>(ctx: &Arc<RunContext>, label: impl Into<String>, f: F) -> Task
where
    F: Fn(Arc<RunContext>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), ManagerError>> + Send + 'static,
{
    let ctx = ctx.clone();
    Task::step(label, move || f(ctx.clone()))
}

async fn build_app(ctx: &RunContext) -> Result<(), ManagerError> {
    let config = &ctx.config;
    let src_dir = match config.ng_src_dir.as_deref() {
        Some(dir) => ctx.inside(dir)?,
        None => ctx.working_dir.path().to_path_buf(),
    };

    if let Some(custom) = config.custom_ng_build_cmd.as_deref().filter(|c| !c.trim().is_empty()) {
        return npm::run_build(ctx.runner.as_ref(), custom, &src_dir).await;
    }

    if config.ng_src_dir.is_none() {
        info!("No primary build configured, skipping");
        return Ok(());
    }

    let dest_dir = config.ng_dest_dir.as_deref().map(|dir| ctx.inside(dir)).transpose()?;
    let command = npm::angular_build_command(dest_dir.as_deref());
    npm::run_build(ctx.runner.as_ref(), &command, &src_dir).await
}
