//! Environment snapshot and drift detection

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::env::values::EnvValues;
use crate::errors::ManagerError;
use crate::filesys::file::File;

/// Referenced environment values captured after a successful (re)install
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvSnapshot {
    values: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture(values: &EnvValues) -> Self {
        Self {
            values: values.as_map().clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Load the snapshot. A missing or unreadable file counts as an empty snapshot.
    pub async fn load(file: &File) -> Self {
        if !file.exists().await {
            debug!("No environment snapshot at {:?}", file.path());
            return Self::default();
        }

        match file.read_json().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring unreadable environment snapshot: {}", e);
                Self::default()
            }
        }
    }

    pub async fn save(&self, file: &File) -> Result<(), ManagerError> {
        file.write_json_atomic(self).await
    }
}

/// Names among `referenced` whose value differs between the snapshot and the
/// live values. Added and removed variables count as differences; names not
/// in `referenced` are never looked at.
pub fn changed_variables(
    referenced: &[String],
    snapshot: &EnvSnapshot,
    current: &EnvValues,
) -> Vec<String> {
    referenced
        .iter()
        .filter(|name| snapshot.get(name) != current.get(name))
        .cloned()
        .collect()
}

/// Whether any referenced variable drifted since the snapshot
pub fn has_changed(referenced: &[String], snapshot: &EnvSnapshot, current: &EnvValues) -> bool {
    let changed = changed_variables(referenced, snapshot, current);
    if changed.is_empty() {
        return false;
    }
    info!("Environment changed since last install: {}", changed.join(", "));
    true
}
