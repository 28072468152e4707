// src/dag/state_manager.rs

//! Per-run state transitions for targets in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::TargetGraph;
use crate::dag::report::BuildOutcome;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::status::{effective_status, Status};
use crate::dag::target::TargetName;
use crate::dag::target_info::{RunState, ScheduledTarget, TargetInfo};

/// Readiness of a pending target given its prerequisites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Some prerequisite is still pending or running.
    Waiting,
    /// A prerequisite failed or was itself blocked.
    Blocked,
    /// All prerequisites are terminal and none blocks.
    Ready,
}

/// Manages per-run state transitions for targets.
pub struct StateManager<'a> {
    graph: &'a TargetGraph,
    order: &'a [TargetName],
    targets: &'a mut HashMap<TargetName, TargetInfo>,
    forced: &'a HashSet<TargetName>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a TargetGraph,
        order: &'a [TargetName],
        targets: &'a mut HashMap<TargetName, TargetInfo>,
        forced: &'a HashSet<TargetName>,
    ) -> Self {
        Self {
            graph,
            order,
            targets,
            forced,
        }
    }

    /// Walk the topological order and settle every pending target whose
    /// prerequisites are terminal: blocked targets are skipped, the rest get
    /// their effective status resolved and are either marked up to date or
    /// handed out for building (`Running`).
    ///
    /// One pass is enough: a target blocked here is visited before any of its
    /// dependents.
    pub fn collect_new_ready(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        for name in self.order {
            let readiness = {
                let Some(info) = self.targets.get(name) else {
                    continue;
                };
                if info.run_state != RunState::Pending {
                    continue;
                }
                ReadOnlyStateManager::new(self.graph, self.targets).readiness_of(name)
            };

            match readiness {
                Readiness::Waiting => {}
                Readiness::Blocked => {
                    if let Some(info) = self.targets.get_mut(name) {
                        info.effective = Some(Status::Outdated);
                        info.final_status = Status::Outdated;
                        info.run_state = RunState::Done(BuildOutcome::SkippedBlocked);
                        warn!(target_name = %name, "prerequisite failed; skipping target");
                        step.newly_blocked.push(name.clone());
                    }
                }
                Readiness::Ready => {
                    let prereq_effective: Vec<Status> = self
                        .graph
                        .prerequisites_of(name)
                        .into_iter()
                        .filter_map(|p| self.targets.get(p).and_then(|i| i.effective))
                        .collect();
                    let forced = self.forced.contains(name);

                    let Some(info) = self.targets.get_mut(name) else {
                        continue;
                    };
                    let effective = effective_status(info.stored, forced, prereq_effective);
                    info.effective = Some(effective);

                    if effective.needs_build() {
                        info!(
                            target_name = %name,
                            stored = %info.stored,
                            effective = %effective,
                            "scheduling target for build"
                        );
                        info.run_state = RunState::Running;
                        step.newly_scheduled.push(ScheduledTarget {
                            name: name.clone(),
                            effective,
                            stored: info.stored,
                        });
                    } else {
                        debug!(target_name = %name, effective = %effective, "target up to date");
                        info.final_status = effective;
                        info.run_state = RunState::Done(BuildOutcome::SkippedUpToDate);
                        step.newly_up_to_date.push(name.clone());
                    }
                }
            }
        }

        step.run_finished = self.all_targets_terminal();
        step
    }

    /// Check if all targets in the run are terminal.
    pub fn all_targets_terminal(&self) -> bool {
        self.targets.values().all(TargetInfo::is_terminal)
    }
}

/// Read-only view used when only shared access to the targets map is at hand.
pub struct ReadOnlyStateManager<'a> {
    graph: &'a TargetGraph,
    targets: &'a HashMap<TargetName, TargetInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(graph: &'a TargetGraph, targets: &'a HashMap<TargetName, TargetInfo>) -> Self {
        Self { graph, targets }
    }

    /// Whether `name` may be considered now.
    ///
    /// Prerequisites outside the run (not selected) are ignored; selection
    /// always includes the full prerequisite closure, so this only happens
    /// for inconsistent inputs.
    pub fn readiness_of(&self, name: &str) -> Readiness {
        let mut blocked = false;

        for prereq in self.graph.prerequisites_of(name) {
            let Some(info) = self.targets.get(prereq) else {
                warn!(target_name = %name, prerequisite = %prereq, "prerequisite not part of this run");
                continue;
            };
            match info.run_state {
                RunState::Pending | RunState::Running => return Readiness::Waiting,
                RunState::Done(_) if info.blocks_dependents() => blocked = true,
                RunState::Done(_) => {}
            }
        }

        if blocked {
            Readiness::Blocked
        } else {
            Readiness::Ready
        }
    }
}
