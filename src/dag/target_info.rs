// src/dag/target_info.rs

//! Per-run target state and the description of a target ready to build.

use crate::dag::report::BuildOutcome;
use crate::dag::status::Status;
use crate::dag::target::TargetName;

/// Per-run state of a target (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting for its prerequisites to reach a terminal state.
    Pending,
    /// Handed to a worker; at most one attempt per target is in flight.
    Running,
    /// Terminal for this run.
    Done(BuildOutcome),
}

/// Public, read-only view of a target's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRunState {
    /// The target is not selected for this run.
    NotInRun,
    Pending,
    Running,
    Done(BuildOutcome),
}

impl From<Option<RunState>> for TargetRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TargetRunState::NotInRun,
            Some(RunState::Pending) => TargetRunState::Pending,
            Some(RunState::Running) => TargetRunState::Running,
            Some(RunState::Done(outcome)) => TargetRunState::Done(outcome),
        }
    }
}

/// Scheduler bookkeeping for one target.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub name: TargetName,
    /// Status loaded (and reclassified) from the store at the start of the run.
    pub stored: Status,
    /// Resolved lazily, once, when all prerequisites are terminal.
    pub effective: Option<Status>,
    pub run_state: RunState,
    /// Status at the end of this run, once terminal.
    pub final_status: Status,
}

impl TargetInfo {
    pub fn new(name: TargetName, stored: Status) -> Self {
        Self {
            name,
            stored,
            effective: None,
            run_state: RunState::Pending,
            final_status: stored,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.run_state, RunState::Done(_))
    }

    /// Whether dependents of this target must be skipped.
    pub fn blocks_dependents(&self) -> bool {
        matches!(
            self.run_state,
            RunState::Done(BuildOutcome::Failed) | RunState::Done(BuildOutcome::SkippedBlocked)
        )
    }
}

/// Description of a target the scheduler wants built now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTarget {
    pub name: TargetName,
    /// Effective status that made the target buildable.
    pub effective: Status,
    /// Status the store held at the start of the run.
    pub stored: Status,
}
