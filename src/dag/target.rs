// src/dag/target.rs

//! Targets, subtargets and their split parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{GeocompileError, Result};
use crate::partition::{partition, partition_span, Range};

/// Canonical target name type used throughout the crate.
pub type TargetName = String;

/// Type tag selecting the build step of a target.
pub type TargetKind = String;

/// Id domain of a complex target.
///
/// ```toml
/// ids = { min = 1, max = 23 }
/// # or
/// ids = [3, 8, 21, 34]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdSpec {
    Span { min: i64, max: i64 },
    List(Vec<i64>),
}

impl IdSpec {
    pub fn partition(&self, chunk_size: usize) -> Result<Vec<Range<i64>>> {
        match self {
            IdSpec::Span { min, max } => partition_span(*min, *max, chunk_size),
            IdSpec::List(ids) => partition(ids.iter().copied(), chunk_size),
        }
    }
}

/// One compilable artifact.
///
/// Immutable once registered in the graph; its status lives in the status
/// store and in the scheduler's per-run state.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: TargetName,
    pub kind: TargetKind,
    /// Free-form parameters handed to the build step.
    pub params: BTreeMap<String, String>,
    /// Id domain split into subtargets (complex targets only).
    pub ids: Option<IdSpec>,
    /// Maximum ids per subtarget (complex targets only).
    pub chunk_size: Option<usize>,
}

impl Target {
    pub fn new(name: impl Into<TargetName>, kind: impl Into<TargetKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            params: BTreeMap::new(),
            ids: None,
            chunk_size: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_ids(mut self, ids: IdSpec, chunk_size: usize) -> Self {
        self.ids = Some(ids);
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Partition this target's id domain into subtargets.
    ///
    /// This is the split most complex build steps want: one subtarget per
    /// `chunk_size` ids, named after the owner and the range bounds.
    pub fn split_by_ids(&self) -> Result<Vec<Subtarget>> {
        let (ids, chunk_size) = match (&self.ids, self.chunk_size) {
            (Some(ids), Some(chunk_size)) => (ids, chunk_size),
            _ => {
                return Err(GeocompileError::PartitionInvariant(format!(
                    "target '{}' has no ids/chunk_size to split on",
                    self.name
                )));
            }
        };

        let ranges = ids.partition(chunk_size)?;
        Ok(ranges
            .into_iter()
            .map(|range| Subtarget::new(self, range))
            .collect())
    }
}

/// One partition of a complex target's work. Never split further.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtarget {
    pub name: TargetName,
    pub owner: TargetName,
    pub kind: TargetKind,
    pub range: Range<i64>,
    pub params: BTreeMap<String, String>,
}

impl Subtarget {
    pub fn new(owner: &Target, range: Range<i64>) -> Self {
        Self {
            name: subtarget_name(&owner.name, &range),
            owner: owner.name.clone(),
            kind: owner.kind.clone(),
            range,
            params: owner.params.clone(),
        }
    }
}

/// Deterministic subtarget name: `<owner>_<min>_<max>`.
///
/// Stable across split calls, which is what lets a resumed build recognise
/// partitions that are already up to date.
pub fn subtarget_name(owner: &str, range: &Range<i64>) -> TargetName {
    format!("{}_{}_{}", owner, range.min(), range.max())
}
