// src/exec/mod.rs

//! Build-step execution layer.
//!
//! - [`delegate`] defines the `BuildStep` / `ComplexBuildStep` capability
//!   traits and the registry mapping target kinds to them.
//! - [`command`] is the production delegate: shell commands per kind, run
//!   with `tokio::process::Command`.
//! - [`pool`] bounds how many build steps run at once.
//! - [`single_flight`] makes sure one target never has two attempts running
//!   at the same time.

pub mod command;
pub mod delegate;
pub mod pool;
pub mod single_flight;

pub use command::{registry_from_config, ShellStep};
pub use delegate::{BuildStep, ComplexBuildStep, Delegate, DelegateRegistry, StepFuture};
pub use pool::WorkerPool;
pub use single_flight::SingleFlight;
