//! HTTP server setup

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::app::options::ServerOptions;
use crate::errors::ManagerError;
use crate::server::handlers::{
    availability_handler, progress_handler, status_page_handler, update_handler,
};
use crate::server::state::{StatusState, UpdateState};

/// Routes of the progress page
pub fn status_router(state: Arc<StatusState>) -> Router {
    Router::new()
        .route("/", get(status_page_handler))
        .route("/progress", get(progress_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Routes of the update endpoint. Every path other than `/update` reports
/// update availability.
pub fn update_router(state: Arc<UpdateState>) -> Router {
    Router::new()
        .route("/update", get(update_handler))
        .fallback(availability_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// A running server that can be stopped to free its port
pub struct ServerHandle {
    name: &'static str,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ManagerError>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait until the listener is closed
    pub async fn shutdown(mut self) -> Result<(), ManagerError> {
        debug!("Stopping {} server on {}", self.name, self.local_addr);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.handle
            .await
            .map_err(|e| ManagerError::ShutdownError(e.to_string()))??;
        info!("{} server on {} stopped", self.name, self.local_addr);
        Ok(())
    }
}

/// Bind `options` and serve `router` in a background task
pub async fn serve(
    name: &'static str,
    options: &ServerOptions,
    router: Router,
) -> Result<ServerHandle, ManagerError> {
    let addr = options.addr();
    info!("Starting {} server on {}", name, addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ManagerError::ServerError(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| ManagerError::ServerError(e.to_string()))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .map_err(|e| ManagerError::ServerError(e.to_string()))
    });

    Ok(ServerHandle {
        name,
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        handle,
    })
}

/// Start the progress page server
pub async fn serve_status(
    options: &ServerOptions,
    state: Arc<StatusState>,
) -> Result<ServerHandle, ManagerError> {
    serve("status", options, status_router(state)).await
}

/// Start the update endpoint server
pub async fn serve_update(
    options: &ServerOptions,
    state: Arc<UpdateState>,
) -> Result<ServerHandle, ManagerError> {
    serve("update", options, update_router(state)).await
}
