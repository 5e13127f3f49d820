//! Interrupted-run detection and the resume/fresh/exit decision.

use outreach_shared::Result;
use outreach_storage::{CheckpointStore, RunMetadata, StagePresence};
use tracing::info;

/// What to do about an incomplete previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryChoice {
    Resume,
    Fresh,
    Exit,
}

/// Everything a prompt needs to describe the interrupted run.
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    pub metadata: RunMetadata,
    pub available: StagePresence,
    /// The run has failed often enough that a fresh start is recommended.
    pub retry_warning: bool,
}

/// Asks the operator how to proceed. Implemented by the CLI over stdin.
pub trait RecoveryPrompt: Send + Sync {
    fn choose(&self, context: &RecoveryContext) -> RecoveryChoice;
}

/// A prompt that always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub RecoveryChoice);

impl RecoveryPrompt for FixedChoice {
    fn choose(&self, _context: &RecoveryContext) -> RecoveryChoice {
        self.0
    }
}

/// How a full run begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// No usable prior state; every stage runs.
    Fresh,
    /// Skip stages whose checkpoints are present.
    Resume(StagePresence),
    Abort,
}

/// Decide how to start, consulting `prompt` only when an incomplete run exists.
///
/// Fresh starts clear leftover checkpoints so a later resume never picks up
/// snapshots from an older run. Resuming bumps the retry count.
pub async fn resolve_start(
    checkpoints: &CheckpointStore,
    prompt: &dyn RecoveryPrompt,
    retry_warning_threshold: u32,
) -> Result<StartMode> {
    let metadata = match checkpoints.run_metadata().await? {
        Some(meta) if checkpoints.has_incomplete_run().await? => meta,
        _ => {
            checkpoints.clear_checkpoints().await?;
            return Ok(StartMode::Fresh);
        }
    };

    let context = RecoveryContext {
        retry_warning: metadata.retry_count >= retry_warning_threshold,
        available: checkpoints.available_stages().await,
        metadata,
    };

    match prompt.choose(&context) {
        RecoveryChoice::Exit => {
            info!("recovery declined, leaving checkpoints untouched");
            Ok(StartMode::Abort)
        }
        RecoveryChoice::Fresh => {
            info!(run_id = %context.metadata.run_id, "discarding incomplete run");
            checkpoints.clear_checkpoints().await?;
            Ok(StartMode::Fresh)
        }
        RecoveryChoice::Resume => {
            let retries = checkpoints.increment_retry_count().await?;
            info!(run_id = %context.metadata.run_id, retries, "resuming incomplete run");
            Ok(StartMode::Resume(context.available))
        }
    }
}
