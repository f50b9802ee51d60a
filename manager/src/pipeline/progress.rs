//! Progress tracking shared with the status server through the filesystem

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::ManagerError;
use crate::filesys::file::File;

/// Persisted progress cursor. `step_nr == total_steps` means the run finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub step_nr: u32,
    pub total_steps: u32,
    pub status_text: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// Completion as `ceil(step_nr / total_steps * 100)`, capped at 100
    pub fn percent(&self) -> u32 {
        if self.total_steps == 0 {
            return 0;
        }
        let step = u64::from(self.step_nr.min(self.total_steps));
        let total = u64::from(self.total_steps);
        ((step * 100).div_ceil(total)) as u32
    }

    pub fn is_complete(&self) -> bool {
        self.total_steps > 0 && self.step_nr >= self.total_steps
    }
}

/// Writes the progress record on every transition.
///
/// The file is the source of truth; there is no in-memory copy readers could
/// consult. One tracker is created per pipeline run.
pub struct ProgressTracker {
    file: File,
    last_step: AtomicU32,
}

impl ProgressTracker {
    pub fn new(file: File) -> Self {
        Self {
            file,
            last_step: AtomicU32::new(0),
        }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Persist `(step_nr, total_steps, text)` before returning.
    ///
    /// The step number never moves backwards within one run; a lower value is
    /// clamped to the last one written.
    pub async fn set_status(
        &self,
        step_nr: u32,
        total_steps: u32,
        text: impl Into<String>,
    ) -> Result<(), ManagerError> {
        let previous = self.last_step.fetch_max(step_nr, Ordering::SeqCst);
        let step_nr = if step_nr < previous {
            warn!("Progress step {} is behind {}, keeping {}", step_nr, previous, previous);
            previous
        } else {
            step_nr
        };

        let record = ProgressRecord {
            step_nr,
            total_steps,
            status_text: text.into(),
            updated_at: Some(Utc::now()),
        };

        info!(
            "[{}/{}] {}",
            record.step_nr, record.total_steps, record.status_text
        );
        self.file.write_json_atomic(&record).await
    }
}

/// Read the current progress record
pub async fn read_progress(file: &File) -> Result<ProgressRecord, ManagerError> {
    file.read_json().await
}
