// src/dag/mod.rs

//! Target graph, status state machine and scheduling.
//!
//! - [`target`] defines targets, subtargets and their split parameters.
//! - [`graph`] holds the acyclic dependency graph of targets.
//! - [`status`] is the persisted status state machine.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   targets need building, and when dependents can be considered.
//! - [`target_info`] provides per-run target state and scheduled target types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.
//! - [`report`] is the end-of-run summary.

pub mod graph;
pub mod report;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod status;
pub mod target;
pub mod target_info;

pub use graph::TargetGraph;
pub use report::{BuildOutcome, RunReport, TargetReport};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use status::{effective_status, Status};
pub use target::{subtarget_name, IdSpec, Subtarget, Target, TargetKind, TargetName};
pub use target_info::{ScheduledTarget, TargetRunState};
