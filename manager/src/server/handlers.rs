//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, IntoResponse},
    Json,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::http::client::UpdateAvailability;
use crate::pipeline::progress::{read_progress, ProgressRecord};
use crate::server::page::render_progress_page;
use crate::server::state::{StatusState, UpdateState};

/// Read the progress file, falling back to the last record that parsed
async fn current_progress(state: &StatusState) -> Option<ProgressRecord> {
    match read_progress(&state.progress_file).await {
        Ok(record) => {
            *state.last_good.write().await = Some(record.clone());
            Some(record)
        }
        Err(e) => {
            debug!("Progress record unavailable, serving last known state: {}", e);
            state.last_good.read().await.clone()
        }
    }
}

/// Progress page handler
pub async fn status_page_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    let record = current_progress(&state).await;
    Html(render_progress_page(record.as_ref(), state.refresh_secs))
}

/// Progress response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub percent: u32,
    #[serde(flatten)]
    pub record: Option<ProgressRecord>,
}

/// Raw progress handler
pub async fn progress_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    let record = current_progress(&state).await;
    Json(ProgressResponse {
        percent: record.as_ref().map(ProgressRecord::percent).unwrap_or(0),
        record,
    })
}

/// Update trigger response
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Update trigger handler. Returns immediately; the update runs in the background.
pub async fn update_handler(State(state): State<Arc<UpdateState>>) -> impl IntoResponse {
    match state.control.trigger_update() {
        Ok(()) => {
            info!("Manual update triggered");
            Json(UpdateResponse {
                success: true,
                message: Some("Update started".to_string()),
                error: None,
            })
        }
        Err(e) => {
            warn!("Manual update rejected: {}", e);
            Json(UpdateResponse {
                success: false,
                message: None,
                error: Some(e.to_string()),
            })
        }
    }
}

/// Update availability response
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub success: bool,
    #[serde(flatten)]
    pub availability: Option<UpdateAvailability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Update availability handler
pub async fn availability_handler(State(state): State<Arc<UpdateState>>) -> impl IntoResponse {
    match state.control.check_for_update().await {
        Ok(availability) => Json(AvailabilityResponse {
            success: true,
            availability: Some(availability),
            error: None,
        }),
        Err(e) => {
            warn!("Update check failed: {}", e);
            Json(AvailabilityResponse {
                success: false,
                availability: None,
                error: Some(e.to_string()),
            })
        }
    }
}
