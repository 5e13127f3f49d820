//! Fan-out of wizard state and log lines to SSE clients.
//!
//! [`EventHub`] wraps a broadcast channel plus a ring of recent log lines so
//! a client connecting mid-run can catch up. [`DashboardLogLayer`] feeds it
//! from `tracing`.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use chrono::Local;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::state::WizardSnapshot;

/// Lines kept for late subscribers.
const LOG_RING_CAPACITY: usize = 500;

const CHANNEL_CAPACITY: usize = 1024;

/// One dashboard log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Local wall-clock time, `HH:MM:SS`.
    pub time: String,
    pub message: String,
    /// `info`, `warn` or `error`.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl LogEntry {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            time: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
            kind,
        }
    }
}

/// An SSE payload: `{"type": "state"|"log", "data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum DashboardEvent {
    State(WizardSnapshot),
    Log(LogEntry),
}

pub struct EventHub {
    sender: broadcast::Sender<DashboardEvent>,
    logs: Mutex<VecDeque<LogEntry>>,
}

impl EventHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            logs: Mutex::new(VecDeque::with_capacity(LOG_RING_CAPACITY)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    pub fn publish_state(&self, snapshot: WizardSnapshot) {
        // No receivers is fine.
        let _ = self.sender.send(DashboardEvent::State(snapshot));
    }

    pub fn push_log(&self, entry: LogEntry) {
        if let Ok(mut logs) = self.logs.lock() {
            if logs.len() == LOG_RING_CAPACITY {
                logs.pop_front();
            }
            logs.push_back(entry.clone());
        }
        let _ = self.sender.send(DashboardEvent::Log(entry));
    }

    /// The newest `n` log lines, oldest first.
    pub fn recent_logs(&self, n: usize) -> Vec<LogEntry> {
        match self.logs.lock() {
            Ok(logs) => logs.iter().skip(logs.len().saturating_sub(n)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear_logs(&self) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.clear();
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// tracing layer
// ---------------------------------------------------------------------------

/// Forwards INFO and above from `outreach*` targets into the hub.
pub struct DashboardLogLayer {
    hub: Arc<EventHub>,
}

impl DashboardLogLayer {
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self { hub }
    }
}

impl<S: Subscriber> Layer<S> for DashboardLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > Level::INFO || !meta.target().starts_with("outreach") {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let kind = match *meta.level() {
            Level::ERROR => "error",
            Level::WARN => "warn",
            _ => "info",
        };
        self.hub.push_log(LogEntry::new(kind, visitor.line()));
    }
}

/// Renders `message key=value ...`.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn line(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}
