//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::deploy::command::{CommandRunner, SystemCommandRunner};
use crate::errors::ManagerError;
use crate::http::client::UpstreamClient;
use crate::installer::install::Installer;
use crate::server::serve::{serve_update, ServerHandle};
use crate::server::state::UpdateState;
use crate::storage::config::Configuration;
use crate::supervisor::state::InstallState;
use crate::supervisor::supervisor::{Supervisor, SupervisorControl, SupervisorOptions};

/// Run the containerizer manager until `shutdown_signal` resolves
pub async fn run(
    config: Configuration,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ManagerError> {
    info!("Initializing containerizer...");

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
    let supervisor = Arc::new(init_supervisor(config, &options, runner)?);
    let mut shutdown_manager = ShutdownManager::new(supervisor.clone(), options.lifecycle.clone());

    if options.enable_update_server {
        if let Err(e) = init_update_server(&options, supervisor.clone(), &mut shutdown_manager).await {
            error!("Failed to start containerizer: {}", e);
            shutdown_manager.shutdown().await?;
            return Err(e);
        }
    }

    // the first pass may install for a long time; a shutdown signal interrupts it
    let first_pass = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move { supervisor.start().await })
    };
    shutdown_manager.with_first_pass_handle(first_pass)?;

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

/// Wire the installer, upstream client and supervisor for a configuration
pub fn init_supervisor(
    config: Configuration,
    options: &AppOptions,
    runner: Arc<dyn CommandRunner>,
) -> Result<Supervisor, ManagerError> {
    let upstream = UpstreamClient::new(&options.upstream_api_url)?;
    let installer = Installer::new(Arc::new(config), options.layout.clone(), runner);

    Ok(Supervisor::new(
        installer,
        options.layout.clone(),
        upstream,
        SupervisorOptions {
            status_server: options.status_server.clone(),
            status_refresh: options.status_refresh,
            restart_grace: options.lifecycle.restart_grace,
        },
    ))
}

async fn init_update_server(
    options: &AppOptions,
    supervisor: Arc<Supervisor>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), ManagerError> {
    info!("Initializing update server...");

    let state = UpdateState::new(Arc::new(SupervisorControl::new(supervisor)));
    let handle = serve_update(&options.update_server, Arc::new(state)).await?;

    shutdown_manager.with_update_server_handle(handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    supervisor: Arc<Supervisor>,
    lifecycle_options: LifecycleOptions,
    update_server_handle: Option<ServerHandle>,
    first_pass_handle: Option<JoinHandle<InstallState>>,
}

impl ShutdownManager {
    fn new(supervisor: Arc<Supervisor>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            supervisor,
            lifecycle_options,
            update_server_handle: None,
            first_pass_handle: None,
        }
    }

    fn with_update_server_handle(&mut self, handle: ServerHandle) -> Result<(), ManagerError> {
        if self.update_server_handle.is_some() {
            return Err(ManagerError::ShutdownError("update_server_handle already set".to_string()));
        }
        self.update_server_handle = Some(handle);
        Ok(())
    }

    fn with_first_pass_handle(
        &mut self,
        handle: JoinHandle<InstallState>,
    ) -> Result<(), ManagerError> {
        if self.first_pass_handle.is_some() {
            return Err(ManagerError::ShutdownError("first_pass_handle already set".to_string()));
        }
        self.first_pass_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ManagerError> {
        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), ManagerError> {
        info!("Shutting down containerizer...");

        // 1. Interrupt a pass that is still installing
        if let Some(handle) = self.first_pass_handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
            let _ = handle.await;
        }

        // 2. Update server
        if let Some(handle) = self.update_server_handle.take() {
            handle.shutdown().await?;
        }

        // 3. Progress page and client app
        self.supervisor.shutdown().await?;

        info!("Shutdown complete");
        Ok(())
    }
}
