//! Per-stage checkpoint files and run metadata.
//!
//! Layout under the recovery directory:
//!
//! ```text
//! .recovery/
//!   run_metadata.json
//!   search_results.json      { timestamp, step, data }
//!   extracted_clients.json
//!   generated_emails.json
//! ```
//!
//! Resume decisions must use [`CheckpointStore::load_checkpoint`] (file
//! presence), not `last_checkpoint` in the metadata: the stage file and the
//! metadata are two separate writes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use outreach_shared::{OutreachError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{read_optional, write_json_atomic};

const METADATA_FILE: &str = "run_metadata.json";

/// A checkpointed pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckpointStage {
    SearchResults,
    ExtractedClients,
    GeneratedEmails,
}

impl CheckpointStage {
    /// All stages in pipeline order.
    pub const ALL: [CheckpointStage; 3] = [
        CheckpointStage::SearchResults,
        CheckpointStage::ExtractedClients,
        CheckpointStage::GeneratedEmails,
    ];

    /// Stage name as written in run metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchResults => "searchResults",
            Self::ExtractedClients => "extractedClients",
            Self::GeneratedEmails => "generatedEmails",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Self::SearchResults => "search_results.json",
            Self::ExtractedClients => "extracted_clients.json",
            Self::GeneratedEmails => "generated_emails.json",
        }
    }
}

impl std::fmt::Display for CheckpointStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk envelope for one stage snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<T> {
    pub timestamp: DateTime<Utc>,
    pub step: CheckpointStage,
    pub data: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Incomplete,
    Complete,
}

/// The single run-tracking record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_checkpoint: Option<CheckpointStage>,
    pub last_update: DateTime<Utc>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<DateTime<Utc>>,
    /// Search country of the run, reused when a resume drafts messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl RunMetadata {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::now_v7().to_string(),
            start_time: now,
            retry_count: 0,
            last_checkpoint: None,
            last_update: now,
            status: RunStatus::Incomplete,
            completed_time: None,
            country: None,
        }
    }
}

/// Which stage snapshots exist on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePresence {
    pub search_results: bool,
    pub extracted_clients: bool,
    pub generated_emails: bool,
}

impl StagePresence {
    pub fn contains(&self, stage: CheckpointStage) -> bool {
        match stage {
            CheckpointStage::SearchResults => self.search_results,
            CheckpointStage::ExtractedClients => self.extracted_clients,
            CheckpointStage::GeneratedEmails => self.generated_emails,
        }
    }
}

/// File-backed checkpoint store rooted at the recovery directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stage_path(&self, stage: CheckpointStage) -> PathBuf {
        self.dir.join(stage.file_name())
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    // -----------------------------------------------------------------------
    // Stage snapshots
    // -----------------------------------------------------------------------

    /// Persist `data` as the snapshot for `stage`, then update run metadata.
    ///
    /// Starts a new run record when none exists or the previous run is
    /// complete.
    pub async fn save_checkpoint<T: Serialize>(&self, stage: CheckpointStage, data: &T) -> Result<()> {
        let now = Utc::now();
        let envelope = Checkpoint {
            timestamp: now,
            step: stage,
            data,
        };
        write_json_atomic(&self.stage_path(stage), &envelope).await?;

        let mut metadata = match self.run_metadata().await? {
            Some(m) if m.status == RunStatus::Incomplete => m,
            _ => RunMetadata::fresh(now),
        };
        metadata.last_checkpoint = Some(stage);
        metadata.last_update = now;
        metadata.status = RunStatus::Incomplete;
        write_json_atomic(&self.metadata_path(), &metadata).await?;

        tracing::debug!(stage = %stage, run_id = %metadata.run_id, "checkpoint saved");
        Ok(())
    }

    /// Load the snapshot for `stage`. Missing or unreadable files yield `None`.
    pub async fn load_checkpoint<T: DeserializeOwned>(&self, stage: CheckpointStage) -> Result<Option<T>> {
        let path = self.stage_path(stage);
        let Some(content) = read_optional(&path).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Checkpoint<T>>(&content) {
            Ok(checkpoint) => Ok(Some(checkpoint.data)),
            Err(e) => {
                tracing::warn!(stage = %stage, path = %path.display(), error = %e, "ignoring corrupt checkpoint");
                Ok(None)
            }
        }
    }

    /// Presence of each stage file. Corrupt files count as present here.
    pub async fn available_stages(&self) -> StagePresence {
        let mut presence = StagePresence::default();
        for stage in CheckpointStage::ALL {
            let present = tokio::fs::try_exists(self.stage_path(stage))
                .await
                .unwrap_or(false);
            match stage {
                CheckpointStage::SearchResults => presence.search_results = present,
                CheckpointStage::ExtractedClients => presence.extracted_clients = present,
                CheckpointStage::GeneratedEmails => presence.generated_emails = present,
            }
        }
        presence
    }

    // -----------------------------------------------------------------------
    // Run metadata
    // -----------------------------------------------------------------------

    /// Current run record, if any. A corrupt file is logged and reads as absent.
    pub async fn run_metadata(&self) -> Result<Option<RunMetadata>> {
        let path = self.metadata_path();
        let Some(content) = read_optional(&path).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&content) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt run metadata");
                Ok(None)
            }
        }
    }

    pub async fn has_incomplete_run(&self) -> Result<bool> {
        Ok(self
            .run_metadata()
            .await?
            .is_some_and(|m| m.status == RunStatus::Incomplete))
    }

    /// Bump the retry counter. No-op without metadata.
    pub async fn increment_retry_count(&self) -> Result<Option<u32>> {
        let Some(mut metadata) = self.run_metadata().await? else {
            return Ok(None);
        };
        metadata.retry_count += 1;
        metadata.last_update = Utc::now();
        write_json_atomic(&self.metadata_path(), &metadata).await?;
        Ok(Some(metadata.retry_count))
    }

    /// Remember the search country of the current run. No-op without metadata.
    pub async fn record_country(&self, country: &str) -> Result<()> {
        let Some(mut metadata) = self.run_metadata().await? else {
            return Ok(());
        };
        metadata.country = Some(country.to_string());
        metadata.last_update = Utc::now();
        write_json_atomic(&self.metadata_path(), &metadata).await
    }

    /// Mark the current run complete. No-op without metadata.
    pub async fn mark_run_complete(&self) -> Result<()> {
        let Some(mut metadata) = self.run_metadata().await? else {
            return Ok(());
        };
        let now = Utc::now();
        metadata.status = RunStatus::Complete;
        metadata.completed_time = Some(now);
        metadata.last_update = now;
        write_json_atomic(&self.metadata_path(), &metadata).await?;
        tracing::info!(run_id = %metadata.run_id, "run marked complete");
        Ok(())
    }

    /// Remove every checkpoint file and the directory itself. Idempotent.
    pub async fn clear_checkpoints(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::info!(dir = %self.dir.display(), "checkpoints cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OutreachError::io(&self.dir, e)),
        }
    }
}
