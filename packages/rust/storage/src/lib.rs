//! Local JSON persistence for Outreach.
//!
//! - [`ContactStore`] keeps the contact collection in a single JSON array file
//!   (`data/clients.json` by default).
//! - [`CheckpointStore`] keeps one snapshot file per pipeline stage plus the
//!   run metadata in the recovery directory (`.recovery/` by default).
//!
//! **Write rules:**
//! - Every write goes to a sibling temp file that is renamed over the target.
//! - The store is single-process; [`ContactStore`] serializes its own writers.

mod checkpoints;
mod contacts;

use std::path::Path;

use outreach_shared::{OutreachError, Result};
use serde::Serialize;

pub use checkpoints::{
    Checkpoint, CheckpointStage, CheckpointStore, RunMetadata, RunStatus, StagePresence,
};
pub use contacts::{ContactFilter, ContactStats, ContactStore, SentFilter};

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| OutreachError::io(parent, e))?;
        }
    }

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| OutreachError::Storage(format!("serialize {}: {e}", path.display())))?;

    let temp = path.with_extension("json.tmp");
    tokio::fs::write(&temp, json)
        .await
        .map_err(|e| OutreachError::io(&temp, e))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| OutreachError::io(path, e))?;
    Ok(())
}

/// Read a file to a string, mapping "not found" to `None`.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(OutreachError::io(path, e)),
    }
}
