// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Structural errors (cycles, duplicates, bad partition parameters) are
//! returned straight to the caller while the build description is being
//! assembled. `BuildStep` errors are recovered per target by the runtime;
//! `Persistence` errors abort the run.

use thiserror::Error;

use crate::dag::Status;

#[derive(Error, Debug)]
pub enum GeocompileError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Target not found: {0}")]
    UnknownTarget(String),

    #[error("Duplicate target: {0}")]
    DuplicateTarget(String),

    #[error("Cycle detected: adding {from} -> {to} would close a cycle")]
    CycleDetected { from: String, to: String },

    #[error("Build step failed for target '{target}': {message}")]
    BuildStep { target: String, message: String },

    #[error("Status persistence failed for target '{target}': {source}")]
    Persistence {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Partition invariant violated: {0}")]
    PartitionInvariant(String),

    #[error("Illegal status transition for '{target}': {from:?} -> {to:?}")]
    IllegalTransition {
        target: String,
        from: Status,
        to: Status,
    },

    #[error("Build run interrupted")]
    Interrupted,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GeocompileError {
    pub fn build_step(target: impl Into<String>, message: impl ToString) -> Self {
        GeocompileError::BuildStep {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn persistence(target: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        GeocompileError::Persistence {
            target: target.into(),
            source: source.into(),
        }
    }

    /// Whether this error must abort the whole run rather than a single target.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GeocompileError::BuildStep { .. })
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, GeocompileError>;
