use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::TargetGraph;
use crate::dag::report::{BuildOutcome, RunReport, TargetReport};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, Readiness, StateManager};
use crate::dag::status::Status;
use crate::dag::target::TargetName;
use crate::dag::target_info::{RunState, ScheduledTarget, TargetInfo, TargetRunState};
use crate::engine::{RunOptions, StepOutcome};
use crate::errors::{GeocompileError, Result};

/// Scheduler holds the immutable graph plus mutable per-run state.
///
/// It is pure: no I/O, no Tokio. It is responsible for:
/// - restricting the run to the selected targets and their prerequisites
/// - resolving each target's effective status once its prerequisites are
///   terminal
/// - handing out buildable targets, at most one attempt per target
/// - skipping the dependents of failed targets
/// - producing the end-of-run report
///
/// Persisting status transitions is the runtime's job; the scheduler only
/// sees a target's outcome after it has been written.
#[derive(Debug, Clone)]
pub struct Scheduler {
    graph: Arc<TargetGraph>,
    /// Topological order restricted to the targets in this run.
    order: Vec<TargetName>,
    targets: HashMap<TargetName, TargetInfo>,
    forced: HashSet<TargetName>,
}

impl Scheduler {
    /// Set up a run from the graph and the statuses loaded from the store.
    ///
    /// `stored` is expected to hold load-reclassified statuses; a target with
    /// no entry is treated as `Missing`.
    pub fn new(
        graph: Arc<TargetGraph>,
        stored: &HashMap<TargetName, Status>,
        options: &RunOptions,
    ) -> Result<Self> {
        for name in options.forced.iter() {
            if !graph.contains(name) {
                return Err(GeocompileError::UnknownTarget(name.clone()));
            }
        }

        let selection: Option<HashSet<TargetName>> = if options.targets.is_empty() {
            None
        } else {
            Some(graph.prerequisite_closure(&options.targets)?)
        };

        let order: Vec<TargetName> = graph
            .topological_order()
            .into_iter()
            .filter(|name| selection.as_ref().is_none_or(|sel| sel.contains(*name)))
            .map(str::to_string)
            .collect();

        let targets = order
            .iter()
            .map(|name| {
                let status = stored.get(name).copied().unwrap_or(Status::Missing);
                (name.clone(), TargetInfo::new(name.clone(), status))
            })
            .collect();

        let forced = options.forced.iter().cloned().collect();

        debug!(targets = order.len(), "scheduler: prepared run");

        Ok(Self {
            graph,
            order,
            targets,
            forced,
        })
    }

    pub fn graph(&self) -> &Arc<TargetGraph> {
        &self.graph
    }

    /// Targets participating in this run, in topological order.
    pub fn order(&self) -> &[TargetName] {
        &self.order
    }

    /// Whether every target in the run is terminal.
    pub fn is_finished(&self) -> bool {
        self.targets.values().all(TargetInfo::is_terminal)
    }

    /// Read-only view of the given target's run state.
    pub fn run_state_of(&self, target: &str) -> TargetRunState {
        self.targets.get(target).map(|info| info.run_state).into()
    }

    /// Effective status, once resolved.
    pub fn effective_status_of(&self, target: &str) -> Option<Status> {
        self.targets.get(target).and_then(|info| info.effective)
    }

    /// Whether `target` can be considered now (for diagnostics and tests).
    pub fn readiness_of(&self, target: &str) -> Option<Readiness> {
        self.targets.get(target)?;
        Some(ReadOnlyStateManager::new(&self.graph, &self.targets).readiness_of(target))
    }

    /// Resolve everything that can be resolved before any build has run.
    pub fn start(&mut self) -> SchedulerStep {
        info!(targets = self.order.len(), "scheduler: starting build run");
        self.collect()
    }

    /// Handle the (already persisted) outcome of a build (production API).
    pub fn handle_completion(&mut self, target: &str, outcome: &StepOutcome) -> Vec<ScheduledTarget> {
        self.step_completion(target, outcome).newly_scheduled
    }

    /// Manual-step variant of `handle_completion` that returns a rich [`SchedulerStep`].
    pub fn step_completion(&mut self, target: &str, outcome: &StepOutcome) -> SchedulerStep {
        match self.targets.get_mut(target) {
            Some(info) if info.run_state == RunState::Running => match outcome {
                StepOutcome::Success => {
                    debug!(target_name = %target, "target built successfully");
                    info.final_status = Status::UpToDate;
                    info.run_state = RunState::Done(BuildOutcome::Built);
                }
                StepOutcome::Failed(message) => {
                    warn!(
                        target_name = %target,
                        error = %message,
                        "target failed; blocking its dependents in this run"
                    );
                    info.final_status = Status::Error;
                    info.run_state = RunState::Done(BuildOutcome::Failed);
                }
            },
            Some(info) => {
                warn!(
                    target_name = %target,
                    state = ?info.run_state,
                    "completion for a target that is not running; ignoring"
                );
                return SchedulerStep::default();
            }
            None => {
                warn!(target_name = %target, "completion for unknown target; ignoring");
                return SchedulerStep::default();
            }
        }

        self.collect()
    }

    /// Per-target outcome, in topological order.
    ///
    /// Targets still pending or running show up as blocked with their stored
    /// status; that only happens for an aborted run.
    pub fn report(&self) -> RunReport {
        let targets = self
            .order
            .iter()
            .filter_map(|name| self.targets.get(name))
            .map(|info| {
                let outcome = match info.run_state {
                    RunState::Done(outcome) => outcome,
                    RunState::Pending | RunState::Running => BuildOutcome::SkippedBlocked,
                };
                TargetReport {
                    name: info.name.clone(),
                    effective: info.effective.unwrap_or(info.stored),
                    status: info.final_status,
                    outcome,
                }
            })
            .collect();

        RunReport { targets }
    }

    /// Dry run: the report this run would produce if every build succeeded.
    pub fn plan(&self) -> RunReport {
        let mut sim = self.clone();
        let mut queue: Vec<ScheduledTarget> = sim.collect().newly_scheduled;

        while let Some(next) = queue.pop() {
            queue.extend(sim.handle_completion(&next.name, &StepOutcome::Success));
        }

        sim.report()
    }

    fn collect(&mut self) -> SchedulerStep {
        let mut manager = StateManager::new(&self.graph, &self.order, &mut self.targets, &self.forced);
        let step = manager.collect_new_ready();
        if step.run_finished {
            info!("scheduler: all targets terminal; run finished");
        }
        step
    }
}
