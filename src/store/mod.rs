// src/store/mod.rs

//! Durable status persistence.
//!
//! The scheduler only talks to a [`StatusStore`]. Any error from a store is
//! fatal to the run: without a reliable status the scheduler cannot tell
//! what still needs building.
//!
//! - [`memory`] keeps statuses in a map (tests, dry runs).
//! - [`file`] keeps statuses in a TOML file written through the
//!   [`FileSystem`](crate::fs::FileSystem) abstraction.

use std::collections::BTreeMap;

use crate::dag::{Status, TargetName};
use crate::errors::Result;

pub mod file;
pub mod memory;

pub use file::{FileStatusStore, DEFAULT_STATUS_FILE};
pub use memory::MemoryStatusStore;

/// Persistence of per-target status.
///
/// Writes for one target must be linearizable; implementations serialize
/// all writes behind a lock.
pub trait StatusStore: Send + Sync {
    /// Stored status, or `Status::Unknown` if the target was never stored.
    fn load_status(&self, target: &str) -> Result<Status>;

    /// Durably record `status` for `target`.
    fn save_status(&self, target: &str, status: Status) -> Result<()>;

    /// Every stored status, by name.
    fn snapshot(&self) -> Result<BTreeMap<TargetName, Status>>;
}
