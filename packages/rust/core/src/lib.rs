//! Pipeline orchestration for Outreach.
//!
//! Stages live in [`stages`]; [`pipeline::Pipeline`] sequences them over the
//! contact and checkpoint stores, and [`recovery`] decides whether an
//! interrupted run is resumed.

pub mod pipeline;
pub mod progress;
pub mod recovery;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::{Pipeline, PipelineSettings, Providers, RunOutcome, RunSummary};
pub use progress::{ProgressReporter, SilentProgress};
pub use recovery::{FixedChoice, RecoveryChoice, RecoveryContext, RecoveryPrompt, StartMode, resolve_start};
pub use stages::{SearchLimits, SendDetail, SendReport, StageDelays};
