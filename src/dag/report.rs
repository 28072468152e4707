// src/dag/report.rs

//! End-of-run summary consumed by the CLI.

use std::fmt;

use crate::dag::status::Status;
use crate::dag::target::TargetName;

/// What happened to a target during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Built,
    SkippedUpToDate,
    /// Not attempted because a prerequisite failed or was itself blocked.
    SkippedBlocked,
    Failed,
}

impl BuildOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, BuildOutcome::Built | BuildOutcome::SkippedUpToDate)
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildOutcome::Built => "built",
            BuildOutcome::SkippedUpToDate => "skipped-up-to-date",
            BuildOutcome::SkippedBlocked => "skipped-blocked",
            BuildOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub name: TargetName,
    /// Effective status the scheduler resolved before deciding to build.
    pub effective: Status,
    /// Status at the end of the run.
    pub status: Status,
    pub outcome: BuildOutcome,
}

/// Per-target outcomes of one run, in topological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    pub fn get(&self, name: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn outcome_of(&self, name: &str) -> Option<BuildOutcome> {
        self.get(name).map(|t| t.outcome)
    }

    /// Names of targets with the given outcome.
    pub fn with_outcome(&self, outcome: BuildOutcome) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| t.outcome == outcome)
            .map(|t| t.name.as_str())
            .collect()
    }

    /// False if any target failed or was blocked by a failure.
    pub fn is_success(&self) -> bool {
        self.targets.iter().all(|t| t.outcome.is_success())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.targets {
            writeln!(f, "{:<32} {:<20} {}", t.name, t.outcome.to_string(), t.status)?;
        }
        Ok(())
    }
}
