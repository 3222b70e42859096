//! Append-only build event log (`build.events.jsonl` in the storage folder).
//!
//! One line per invocation; the log only grows. Gives a portable snapshot an
//! audit trail of what was baked into it and when.

use crate::core::error::DatastowError;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use ulid::Ulid;

pub const BUILD_EVENTS_FILE: &str = "build.events.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildEvent {
    pub ts: String,
    pub event_id: String,
    pub run_id: String,
    pub function: String,
    pub storage_key: String,
    pub kind: String,
    pub duration_ms: u64,
    pub artifact: String,
}

/// Unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

pub fn new_run_id() -> String {
    Ulid::new().to_string()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

pub fn append_build_event(folder: &Path, event: &BuildEvent) -> Result<(), DatastowError> {
    let events_path = folder.join(BUILD_EVENTS_FILE);
    let line = serde_json::to_string(event).map_err(|e| {
        DatastowError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&events_path)
        .map_err(DatastowError::IoError)?;
    writeln!(file, "{}", line).map_err(DatastowError::IoError)?;
    Ok(())
}

/// Read every event in the log, oldest first.
pub fn read_build_events(folder: &Path) -> Result<Vec<BuildEvent>, DatastowError> {
    let events_path = folder.join(BUILD_EVENTS_FILE);
    if !events_path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&events_path).map_err(DatastowError::IoError)?;
    let mut events = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let event: BuildEvent = serde_json::from_str(line)
            .map_err(|e| DatastowError::ValidationError(format!("corrupt event line: {}", e)))?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_epoch_z_format() {
        let result = now_epoch_z();
        assert!(result.ends_with('Z'));
        assert!(result.trim_end_matches('Z').parse::<u64>().is_ok());
    }

    #[test]
    fn test_run_ids_are_unique_ulids() {
        let a = new_run_id();
        let b = new_run_id();
        assert_ne!(a, b);
        assert!(Ulid::from_string(&a).is_ok());
    }
}
