use std::path::PathBuf;
use std::sync::Arc;

use outreach_core::{Pipeline, ProgressReporter};
use outreach_shared::{AppConfig, NewContact};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::error::AppError;
use crate::events::EventHub;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub wizard: Arc<Mutex<Wizard>>,
    /// Held for the duration of any stage; a second stage gets 409.
    pub run_guard: Arc<Mutex<()>>,
    pub hub: Arc<EventHub>,
    /// Config as last loaded or saved. Pipeline changes apply on restart.
    pub config: Arc<RwLock<AppConfig>>,
    pub config_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, hub: Arc<EventHub>, config: AppConfig, config_path: PathBuf) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            wizard: Arc::new(Mutex::new(Wizard::default())),
            run_guard: Arc::new(Mutex::new(())),
            hub,
            config: Arc::new(RwLock::new(config)),
            config_path: Arc::new(config_path),
        }
    }

    /// Claim the run guard or fail with 409.
    pub fn begin_stage(&self) -> Result<OwnedMutexGuard<()>, AppError> {
        self.run_guard
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::Busy("Automation is already running".into()))
    }

    /// Apply `update` to the wizard and broadcast the new state.
    pub async fn update_wizard(&self, update: impl FnOnce(&mut Wizard)) {
        let snapshot = {
            let mut wizard = self.wizard.lock().await;
            update(&mut wizard);
            wizard.snapshot()
        };
        self.hub.publish_state(snapshot);
    }
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WizardStats {
    pub found: usize,
    pub generated: usize,
    pub saved: usize,
    pub sent: usize,
}

/// Four-step wizard progress and the data carried between steps.
#[derive(Debug, Default)]
pub struct Wizard {
    pub status: WizardStatus,
    pub current_step: u8,
    pub stats: WizardStats,
    pub country: Option<String>,
    pub extracted: Vec<NewContact>,
    pub generated: Vec<NewContact>,
}

impl Wizard {
    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            status: self.status,
            current_step: self.current_step,
            stats: self.stats,
        }
    }
}

/// What SSE clients see of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub status: WizardStatus,
    pub current_step: u8,
    pub stats: WizardStats,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Reports stage progress as log lines, which reach the browser via the hub.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn phase(&self, name: &str) {
        info!("{name}...");
    }

    fn item(&self, label: &str, current: usize, total: usize) {
        debug!("[{current}/{total}] {label}");
    }

    fn finish(&self, message: &str) {
        info!("{message}");
    }
}
