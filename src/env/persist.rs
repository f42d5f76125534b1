//! Best-effort persistence of runtime environment state.
//!
//! The in-memory store stays authoritative for the session; a failed
//! read or write is logged at debug level and otherwise ignored.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// State surviving a proxy restart: selection plus per-environment cookies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    /// Name of the selected environment.
    pub selected: String,

    /// Cookie jar per environment name.
    #[serde(default)]
    pub cookies: HashMap<String, Vec<String>>,
}

/// Read persisted state, if any.
pub fn load_state(path: &Path) -> Option<PersistedState> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(error) => {
            tracing::debug!(path = %path.display(), %error, "Ignoring unreadable state file");
            None
        }
    }
}

/// Write persisted state, swallowing failures.
pub fn store_state(path: &Path, state: &PersistedState) {
    let json = match serde_json::to_string_pretty(state) {
        Ok(json) => json,
        Err(error) => {
            tracing::debug!(%error, "Failed to serialize state");
            return;
        }
    };
    if let Err(error) = fs::write(path, json) {
        tracing::debug!(path = %path.display(), %error, "Failed to write state file");
    }
}
