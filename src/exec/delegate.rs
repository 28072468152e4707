// src/exec/delegate.rs

//! Pluggable build-step delegates.
//!
//! The runtime never builds anything itself. It looks up the delegate
//! registered for a target's kind and calls it through one of two
//! capability sets:
//!
//! - [`BuildStep`]: a target compiled as a single unit.
//! - [`ComplexBuildStep`]: a target split into subtargets that are compiled
//!   independently and merged.
//!
//! Production code registers [`ShellStep`](super::command::ShellStep)s built
//! from the config; tests register recording fakes.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dag::{Subtarget, Target, TargetGraph, TargetKind};
use crate::errors::{GeocompileError, Result};

/// Boxed future returned by delegate methods.
pub type StepFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Build step for targets compiled as one unit.
pub trait BuildStep: Send + Sync {
    /// Produce or update the artifact named by `target`.
    fn compile<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()>;

    /// Remove the artifact named by `target`.
    fn clean<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()>;
}

/// Build step for targets whose work is split into subtargets.
///
/// `split` must be deterministic for a given target: a resumed build calls it
/// again and relies on identical subtarget names to skip finished work.
/// `compile_subtarget` must tolerate being re-invoked after an interrupted
/// attempt.
pub trait ComplexBuildStep: Send + Sync {
    /// Complete, non-overlapping partition of the target's work.
    fn split<'a>(&'a self, target: &'a Target) -> StepFuture<'a, Vec<Subtarget>>;

    fn compile_subtarget<'a>(&'a self, subtarget: &'a Subtarget) -> StepFuture<'a, ()>;

    fn clean_subtarget<'a>(&'a self, subtarget: &'a Subtarget) -> StepFuture<'a, ()>;

    /// Combine every subtarget's output into the target's artifact. Only
    /// called once all subtargets are up to date.
    fn merge<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()>;

    /// Remove the artifacts of the target and all its subtargets.
    fn clean_all<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()>;
}

/// Capability set registered for one target kind.
#[derive(Clone)]
pub enum Delegate {
    Simple(Arc<dyn BuildStep>),
    Complex(Arc<dyn ComplexBuildStep>),
}

impl Delegate {
    pub fn is_complex(&self) -> bool {
        matches!(self, Delegate::Complex(_))
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delegate::Simple(_) => f.write_str("Delegate::Simple"),
            Delegate::Complex(_) => f.write_str("Delegate::Complex"),
        }
    }
}

/// Maps target kinds to their delegates.
#[derive(Debug, Clone, Default)]
pub struct DelegateRegistry {
    delegates: HashMap<TargetKind, Delegate>,
}

impl DelegateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_simple(&mut self, kind: impl Into<TargetKind>, step: Arc<dyn BuildStep>) {
        self.delegates.insert(kind.into(), Delegate::Simple(step));
    }

    pub fn register_complex(
        &mut self,
        kind: impl Into<TargetKind>,
        step: Arc<dyn ComplexBuildStep>,
    ) {
        self.delegates.insert(kind.into(), Delegate::Complex(step));
    }

    pub fn get(&self, kind: &str) -> Option<&Delegate> {
        self.delegates.get(kind)
    }

    /// Whether `kind` is registered with a complex delegate.
    pub fn is_complex(&self, kind: &str) -> bool {
        self.get(kind).is_some_and(Delegate::is_complex)
    }

    /// Delegate for `target`'s kind.
    pub fn for_target(&self, target: &Target) -> Result<&Delegate> {
        self.get(&target.kind).ok_or_else(|| {
            GeocompileError::build_step(
                target.name.clone(),
                format!("no build step registered for kind '{}'", target.kind),
            )
        })
    }

    /// Check up front that every target in `graph` has a delegate.
    pub fn validate(&self, graph: &TargetGraph) -> Result<()> {
        for target in graph.vertices() {
            if !self.delegates.contains_key(&target.kind) {
                return Err(GeocompileError::ConfigError(format!(
                    "target '{}' has kind '{}' with no registered build step",
                    target.name, target.kind
                )));
            }
        }
        Ok(())
    }
}
