// src/dag/status.rs

//! Persisted target status and its legal transitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{GeocompileError, Result};

/// Condition of a target (or subtarget) artifact.
///
/// Every value is persisted by the status store, so a fresh process can tell
/// a finished build apart from one that was interrupted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Not loaded from the store yet in this run.
    #[default]
    Unknown,
    /// Artifact does not exist; it must be created, not updated.
    Missing,
    /// Build in progress for an artifact that did not exist.
    Creating,
    /// Build in progress for an existing artifact.
    Updating,
    /// Build step succeeded; `UpToDate` not yet persisted.
    Completed,
    #[serde(rename = "UPTODATE")]
    UpToDate,
    /// A prerequisite changed or is not up to date.
    Outdated,
    /// A complex target was interrupted mid-build; some subtargets may be done.
    Incomplete,
    /// Explicit rebuild requested by the user.
    Forced,
    /// Last build attempt failed.
    Error,
}

impl Status {
    pub const ALL: [Status; 10] = [
        Status::Unknown,
        Status::Missing,
        Status::Creating,
        Status::Updating,
        Status::Completed,
        Status::UpToDate,
        Status::Outdated,
        Status::Incomplete,
        Status::Forced,
        Status::Error,
    ];

    /// Whether a target in this (effective) status has to be built.
    pub fn needs_build(self) -> bool {
        matches!(
            self,
            Status::Missing
                | Status::Outdated
                | Status::Incomplete
                | Status::Forced
                | Status::Error
        )
    }

    /// Transient states written while a build step is running.
    pub fn is_in_progress(self) -> bool {
        matches!(self, Status::Creating | Status::Updating)
    }

    /// In-progress status to persist before invoking the build step.
    ///
    /// `self` is the effective status; `stored` is what the store held, which
    /// decides between creating and updating the artifact. `None` when the
    /// effective status does not call for a build.
    pub fn build_start(self, stored: Status) -> Option<Status> {
        if !self.needs_build() {
            return None;
        }
        if self == Status::Missing || stored == Status::Missing {
            Some(Status::Creating)
        } else {
            Some(Status::Updating)
        }
    }

    /// Legal scheduler-driven transitions.
    ///
    /// `Forced` and `Missing` (explicit clean) are reachable from any state.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;

        if matches!(next, Forced | Missing) {
            return true;
        }

        match (self, next) {
            (Unknown, UpToDate | Outdated | Incomplete | Error) => true,
            (Missing | Outdated | Incomplete | Forced | Error, Creating | Updating) => true,
            (Creating | Updating, Completed | Error) => true,
            (Completed, UpToDate) => true,
            (UpToDate, Outdated) => true,
            _ => false,
        }
    }

    /// Checked transition; `target` only feeds the error message.
    pub fn transition(self, target: &str, next: Status) -> Result<Status> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(GeocompileError::IllegalTransition {
                target: target.to_string(),
                from: self,
                to: next,
            })
        }
    }

    /// Classify a status read back from the store at the start of a run.
    ///
    /// - never stored: `Missing`
    /// - interrupted complex build: `Incomplete`
    /// - interrupted simple build: `Missing` when it was being created,
    ///   `Outdated` when it was being updated
    /// - `Completed`: the build finished, only the final write was lost
    pub fn reclassify_on_load(self, complex: bool) -> Status {
        match self {
            Status::Unknown => Status::Missing,
            Status::Creating | Status::Updating if complex => Status::Incomplete,
            Status::Creating => Status::Missing,
            Status::Updating => Status::Outdated,
            Status::Completed => Status::UpToDate,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unknown => "UNKNOWN",
            Status::Missing => "MISSING",
            Status::Creating => "CREATING",
            Status::Updating => "UPDATING",
            Status::Completed => "COMPLETED",
            Status::UpToDate => "UPTODATE",
            Status::Outdated => "OUTDATED",
            Status::Incomplete => "INCOMPLETE",
            Status::Forced => "FORCED",
            Status::Error => "ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase().replace(['-', '_'], "");
        Status::ALL
            .into_iter()
            .find(|st| st.as_str().replace('_', "") == wanted)
            .ok_or_else(|| format!("invalid status: {s}"))
    }
}

/// Resolve the status used for scheduling decisions.
///
/// Forced wins; otherwise any prerequisite whose effective status is not
/// `UpToDate` makes the target `Outdated`; otherwise the loaded status stands.
pub fn effective_status<I>(loaded: Status, forced: bool, prerequisites: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    if forced {
        return Status::Forced;
    }
    if prerequisites.into_iter().any(|s| s != Status::UpToDate) {
        return Status::Outdated;
    }
    loaded
}
