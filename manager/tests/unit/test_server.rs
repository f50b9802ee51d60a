//! Progress page and update endpoint tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use containerizer::app::options::ServerOptions;
use containerizer::errors::ManagerError;
use containerizer::filesys::file::File;
use containerizer::http::client::{UpdateAvailability, UpstreamClient};
use containerizer::installer::install::Installer;
use containerizer::pipeline::progress::{ProgressRecord, ProgressTracker};
use containerizer::server::serve::{serve_status, status_router, update_router};
use containerizer::server::state::{StatusState, UpdateControl, UpdateState};
use containerizer::storage::layout::StorageLayout;
use containerizer::storage::version::{save_version, VersionRecord};
use containerizer::supervisor::supervisor::{Supervisor, SupervisorControl, SupervisorOptions};

use crate::common::{config, RecordingRunner};

async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get_json(router: Router, uri: &str) -> Value {
    let (status, body) = get_body(router, uri).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_str(&body).unwrap()
}

// ================================ STATUS PAGE ==================================== //

#[tokio::test]
async fn test_status_page_shows_loading_without_progress_file() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(StatusState::new(File::new(dir.path().join("status.json")), 3));

    let (status, body) = get_body(status_router(state), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Loading..."));
    assert!(body.contains(r#"http-equiv="refresh" content="3""#));
}

#[tokio::test]
async fn test_status_page_reads_fresh_progress_and_keeps_last_good() {
    let dir = tempfile::tempdir().unwrap();
    let file = File::new(dir.path().join("status.json"));
    let state = Arc::new(StatusState::new(file.clone(), 3));
    let router = status_router(state);

    let tracker = ProgressTracker::new(file.clone());
    tracker.set_status(3, 9, "Installing dependencies").await.unwrap();
    let (_, body) = get_body(router.clone(), "/").await;
    assert!(body.contains("<strong>34%</strong>"));
    assert!(body.contains("Installing dependencies"));

    // read on every request
    tracker.set_status(4, 9, "Creating files").await.unwrap();
    let (_, body) = get_body(router.clone(), "/").await;
    assert!(body.contains("<strong>45%</strong>"));

    // a torn file falls back to the last good record
    std::fs::write(file.path(), "{\"stepNr\": 5, \"tot").unwrap();
    let (status, body) = get_body(router.clone(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<strong>45%</strong>"));

    let progress = get_json(router, "/progress").await;
    assert_eq!(progress["percent"], 45);
    assert_eq!(progress["stepNr"], 4);
    assert_eq!(progress["totalSteps"], 9);
}

#[tokio::test]
async fn test_status_server_frees_port_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(StatusState::new(File::new(dir.path().join("status.json")), 3));
    let options = ServerOptions {
        host: "127.0.0.1".to_string(),
        port: 0,
    };

    let handle = serve_status(&options, state).await.unwrap();
    let addr = handle.local_addr();
    assert!(tokio::net::TcpStream::connect(addr).await.is_ok());

    handle.shutdown().await.unwrap();
    let rebound = TcpListener::bind(addr).await;
    assert!(rebound.is_ok());
}

// =============================== UPDATE ENDPOINT ================================== //

struct BusyControl;

#[async_trait]
impl UpdateControl for BusyControl {
    fn trigger_update(&self) -> Result<(), ManagerError> {
        Err(ManagerError::InstallInProgress)
    }

    async fn check_for_update(&self) -> Result<UpdateAvailability, ManagerError> {
        Err(ManagerError::NetworkError("upstream unreachable".to_string()))
    }
}

#[tokio::test]
async fn test_update_rejected_while_in_progress() {
    let router = update_router(Arc::new(UpdateState::new(Arc::new(BusyControl))));

    let body = get_json(router.clone(), "/update").await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], ManagerError::InstallInProgress.to_string());

    let body = get_json(router, "/").await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("upstream unreachable"));
}

async fn mock_upstream() -> String {
    let app = Router::new().route(
        "/repos/{owner}/{repo}/commits",
        get(|| async {
            Json(json!([
                { "sha": "c3", "commit": { "message": "Add dashboard" } },
                { "sha": "c2", "commit": { "message": "Fix login" } },
                { "sha": "c1", "commit": { "message": "Initial release" } },
                { "sha": "c0", "commit": { "message": "Initial commit" } },
            ]))
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn supervisor(base: &std::path::Path, upstream_url: &str) -> Arc<Supervisor> {
    let layout = StorageLayout::new(base);
    let installer = Installer::new(
        Arc::new(config(base, "")),
        layout.clone(),
        Arc::new(RecordingRunner::new()),
    );
    Arc::new(Supervisor::new(
        installer,
        layout,
        UpstreamClient::new(upstream_url).unwrap(),
        SupervisorOptions {
            status_server: ServerOptions {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            status_refresh: Duration::from_secs(3),
            restart_grace: Duration::from_millis(200),
        },
    ))
}

#[tokio::test]
async fn test_availability_counts_commits_after_installed_one() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    save_version(
        &layout.version_file(),
        &VersionRecord::new(
            "c1".to_string(),
            "https://github.com/hrueger/app".to_string(),
            "main".to_string(),
        ),
    )
    .await
    .unwrap();

    let upstream = mock_upstream().await;
    let control = SupervisorControl::new(supervisor(dir.path(), &upstream));
    let router = update_router(Arc::new(UpdateState::new(Arc::new(control))));

    let body = get_json(router, "/anything").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["updateAvailable"], true);
    assert_eq!(body["commitsBehind"], 2);
    assert_eq!(body["currentCommit"], "c1");
    assert_eq!(body["latestCommit"], "c3");
    assert_eq!(body["commits"][0]["message"], "Add dashboard");
    assert_eq!(body["commits"][1]["sha"], "c2");
}

#[tokio::test]
async fn test_availability_without_installed_version_fails_softly() {
    let dir = tempfile::tempdir().unwrap();
    let upstream = mock_upstream().await;
    let control = SupervisorControl::new(supervisor(dir.path(), &upstream));
    let router = update_router(Arc::new(UpdateState::new(Arc::new(control))));

    let body = get_json(router, "/").await;
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_update_trigger_acknowledges_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = supervisor(dir.path(), "http://127.0.0.1:9");
    let control = SupervisorControl::new(supervisor.clone());
    let router = update_router(Arc::new(UpdateState::new(Arc::new(control))));

    let body = get_json(router.clone(), "/update").await;
    assert_eq!(body["success"], true);
    assert!(body["message"].is_string());

    // the background update holds the install lock until it is done
    let finished = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match supervisor.manual_update().await {
                Err(ManagerError::InstallInProgress) => {
                    tokio::time::sleep(Duration::from_millis(20)).await
                }
                other => return other,
            }
        }
    })
    .await
    .unwrap();
    assert!(finished.unwrap());
    assert!(StorageLayout::new(dir.path()).version_file().path().exists());

    supervisor.shutdown().await.unwrap();
}

#[test]
fn test_progress_record_wire_format() {
    let record: ProgressRecord =
        serde_json::from_str(r#"{"stepNr": 2, "totalSteps": 9, "statusText": "Cloning"}"#).unwrap();
    assert_eq!(record.step_nr, 2);
    assert_eq!(record.updated_at, None);
}
