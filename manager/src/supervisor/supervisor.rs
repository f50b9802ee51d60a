//! Supervision of install state, progress page and the managed app

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::app::options::ServerOptions;
use crate::env::snapshot::EnvSnapshot;
use crate::env::values::EnvValues;
use crate::errors::ManagerError;
use crate::http::client::{UpdateAvailability, UpstreamClient};
use crate::installer::install::{InstallOutcome, Installer};
use crate::server::serve::{serve_status, ServerHandle};
use crate::server::state::{StatusState, UpdateControl};
use crate::storage::layout::StorageLayout;
use crate::storage::version::{has_version, load_version};
use crate::supervisor::process::{AppCommand, ManagedApp};
use crate::supervisor::state::{determine_state, InstallState};

/// Supervisor options
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub status_server: ServerOptions,
    pub status_refresh: Duration,
    pub restart_grace: Duration,
}

/// Drives the install state machine and owns the managed app.
///
/// Every install run happens under `install_lock`, so the installer never
/// runs twice concurrently.
pub struct Supervisor {
    layout: StorageLayout,
    installer: Installer,
    app: ManagedApp,
    upstream: UpstreamClient,
    options: SupervisorOptions,
    status_server: Mutex<Option<ServerHandle>>,
    install_lock: Arc<Mutex<()>>,
}

impl Supervisor {
    pub fn new(
        installer: Installer,
        layout: StorageLayout,
        upstream: UpstreamClient,
        options: SupervisorOptions,
    ) -> Self {
        let config = installer.config();
        let working_dir = layout.working_dir(&config.working_dir_path);
        let start_file = working_dir
            .path()
            .join(config.start_file.trim_start_matches(['/', '\\']));
        let app = ManagedApp::new(AppCommand::new(
            &config.start_command,
            start_file,
            working_dir.path().to_path_buf(),
        ));

        Self {
            layout,
            installer,
            app,
            upstream,
            options,
            status_server: Mutex::new(None),
            install_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn app(&self) -> &ManagedApp {
        &self.app
    }

    /// Resolve the referenced environment variables once for this pass
    pub fn current_env(&self) -> EnvValues {
        EnvValues::from_process(self.installer.config().referenced_env_vars())
    }

    /// Install state for the given environment values
    pub async fn install_state(&self, env: &EnvValues) -> InstallState {
        determine_state(
            &self.layout,
            &self.installer.config().referenced_env_vars(),
            env,
        )
        .await
    }

    /// One supervisor pass: install or update if needed, then start the app.
    /// Returns the state the pass started from.
    pub async fn start(&self) -> InstallState {
        let env = self.current_env();
        self.start_with_env(&env).await
    }

    /// Same as [`Supervisor::start`] with explicitly resolved environment values
    pub async fn start_with_env(&self, env: &EnvValues) -> InstallState {
        let _guard = self.install_lock.lock().await;

        let state = self.install_state(env).await;
        info!("Install state: {:?}", state);

        if state.needs_install() && !self.install_behind_status(state.is_update(), env).await {
            warn!("Client app not started, the install did not complete");
            return state;
        }

        self.start_app().await;
        state
    }

    /// Stop the app, rerun the pipeline and restart the app. Without an
    /// installed version this is a full install rather than an update.
    /// The caller must hold the install lock.
    async fn update(&self) -> bool {
        if let Err(e) = self.app.stop(self.options.restart_grace).await {
            error!("Failed to stop client app: {}", e);
        }

        let updating = has_version(&self.layout.version_file()).await;
        if !updating {
            info!("No installed version, running a full install");
        }

        let env = self.current_env();
        if !self.install_behind_status(updating, &env).await {
            warn!("Client app not restarted, the update did not complete");
            return false;
        }

        self.start_app().await;
        true
    }

    /// Run a manual update now. Fails if another install is in flight.
    pub async fn manual_update(&self) -> Result<bool, ManagerError> {
        let _guard = self
            .install_lock
            .try_lock()
            .map_err(|_| ManagerError::InstallInProgress)?;
        info!("Running manual update");
        Ok(self.update().await)
    }

    /// Run the pipeline with the progress page up. On success the environment
    /// snapshot is rewritten and the page is taken down to free its port; on
    /// failure the page stays up showing the stalled progress.
    async fn install_behind_status(&self, updating: bool, env: &EnvValues) -> bool {
        if let Err(e) = self.installer.reset_progress(updating).await {
            warn!("Failed to reset progress: {}", e);
        }
        self.start_status_server().await;

        match self.installer.run(updating, env).await {
            InstallOutcome::Installed(record) => {
                info!("Installed commit {}", record.commit);
                let snapshot = EnvSnapshot::capture(env);
                if let Err(e) = snapshot.save(&self.layout.env_snapshot_file()).await {
                    error!("Failed to save environment snapshot: {}", e);
                }
                self.stop_status_server().await;
                true
            }
            InstallOutcome::Failed(_) => false,
        }
    }

    async fn start_app(&self) {
        if let Err(e) = self.app.start().await {
            error!("Failed to start client app: {}", e);
        }
    }

    /// Start the progress page if it is not already up
    pub async fn start_status_server(&self) {
        let mut server = self.status_server.lock().await;
        if server.is_some() {
            return;
        }

        let state = Arc::new(StatusState::new(
            self.layout.progress_file(),
            self.options.status_refresh.as_secs(),
        ));
        match serve_status(&self.options.status_server, state).await {
            Ok(handle) => *server = Some(handle),
            Err(e) => error!("Failed to start status server: {}", e),
        }
    }

    /// Take the progress page down and wait until its port is free
    pub async fn stop_status_server(&self) {
        if let Some(handle) = self.status_server.lock().await.take() {
            if let Err(e) = handle.shutdown().await {
                error!("Failed to stop status server: {}", e);
            }
        }
    }

    pub async fn is_status_server_running(&self) -> bool {
        self.status_server.lock().await.is_some()
    }

    /// Compare the installed commit against upstream
    pub async fn update_availability(&self) -> Result<UpdateAvailability, ManagerError> {
        let version = load_version(&self.layout.version_file())
            .await
            .map_err(|e| ManagerError::NetworkError(format!("No installed version: {}", e)))?;
        let config = self.installer.config();
        self.upstream
            .check_for_update(&config.repository, &config.branch, &version.commit)
            .await
    }

    /// Stop the app and the progress page
    pub async fn shutdown(&self) -> Result<(), ManagerError> {
        info!("Stopping supervisor...");
        self.stop_status_server().await;
        self.app.stop(self.options.restart_grace).await
    }
}

/// Update endpoint bound to a shared supervisor
pub struct SupervisorControl {
    supervisor: Arc<Supervisor>,
}

impl SupervisorControl {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }
}

#[async_trait]
impl UpdateControl for SupervisorControl {
    fn trigger_update(&self) -> Result<(), ManagerError> {
        let guard = self
            .supervisor
            .install_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| ManagerError::InstallInProgress)?;

        let supervisor = self.supervisor.clone();
        tokio::spawn(async move {
            let _guard = guard;
            info!("Running manual update");
            if supervisor.update().await {
                info!("Manual update finished");
            }
        });
        Ok(())
    }

    async fn check_for_update(&self) -> Result<UpdateAvailability, ManagerError> {
        self.supervisor.update_availability().await
    }
}
