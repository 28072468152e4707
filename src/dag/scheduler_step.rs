// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::target::TargetName;
use crate::dag::target_info::ScheduledTarget;

/// Structured result of a single scheduler "step".
///
/// Tests use it to step the graph by hand and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Targets that became ready to build as a result of this step.
    pub newly_scheduled: Vec<ScheduledTarget>,
    /// Targets resolved as up to date (nothing to build) in this step.
    pub newly_up_to_date: Vec<TargetName>,
    /// Targets skipped in this step because a prerequisite failed.
    pub newly_blocked: Vec<TargetName>,
    /// Whether every target is now terminal.
    pub run_finished: bool,
}
