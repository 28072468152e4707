// src/engine/mod.rs

//! Orchestration engine for a build run.
//!
//! The pure scheduling state machine lives in [`crate::dag::Scheduler`]; this
//! module is the async shell around it:
//! - [`runtime`] loads statuses, drives the scheduler and reacts to
//!   completion events from workers.
//! - [`worker`] runs the three-phase build contract for one target and
//!   persists every transition.
//! - [`complex`] is the split / fan-out / merge protocol for complex targets.

use crate::errors::{GeocompileError, Result};

pub use crate::dag::TargetName;

/// Outcome of a build step as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failed(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success)
    }
}

impl From<Result<()>> for StepOutcome {
    fn from(res: Result<()>) -> Self {
        match res {
            Ok(()) => StepOutcome::Success,
            Err(err) => StepOutcome::Failed(err.to_string()),
        }
    }
}

/// Options for one run, passed explicitly rather than read from globals.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Upper bound on concurrently running build steps (including
    /// subtargets, splits and merges).
    pub workers: usize,
    /// Targets to rebuild regardless of their status.
    pub forced: Vec<TargetName>,
    /// Restrict the run to these targets and their prerequisites. Empty
    /// means every target.
    pub targets: Vec<TargetName>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            forced: Vec::new(),
            targets: Vec::new(),
        }
    }
}

/// Events flowing into the runtime from workers and signal handlers.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// A target's outcome has been persisted.
    TargetFinished {
        target: TargetName,
        outcome: StepOutcome,
    },
    /// Status bookkeeping failed; the run cannot continue.
    BookkeepingFailed {
        target: TargetName,
        error: GeocompileError,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod complex;
pub mod runtime;
pub mod worker;

pub use runtime::Runtime;
pub use worker::BuildContext;
