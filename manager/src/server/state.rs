//! Server state

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::ManagerError;
use crate::filesys::file::File;
use crate::http::client::UpdateAvailability;
use crate::pipeline::progress::ProgressRecord;

/// State of the progress page
pub struct StatusState {
    pub progress_file: File,
    pub refresh_secs: u64,
    /// Last record that parsed, served while the file is missing or mid-write
    pub last_good: RwLock<Option<ProgressRecord>>,
}

impl StatusState {
    pub fn new(progress_file: File, refresh_secs: u64) -> Self {
        Self {
            progress_file,
            refresh_secs,
            last_good: RwLock::new(None),
        }
    }
}

/// Operations behind the update endpoint
#[async_trait]
pub trait UpdateControl: Send + Sync {
    /// Start a manual update in the background. Fails with
    /// [`ManagerError::InstallInProgress`] while another run is active.
    fn trigger_update(&self) -> Result<(), ManagerError>;

    /// Compare the installed version with upstream
    async fn check_for_update(&self) -> Result<UpdateAvailability, ManagerError>;
}

/// State of the update endpoint
pub struct UpdateState {
    pub control: Arc<dyn UpdateControl>,
}

impl UpdateState {
    pub fn new(control: Arc<dyn UpdateControl>) -> Self {
        Self { control }
    }
}
