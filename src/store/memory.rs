// src/store/memory.rs

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use tracing::debug;

use crate::dag::{Status, TargetName};
use crate::errors::{GeocompileError, Result};

use super::StatusStore;

/// Stores statuses in memory only (lost on restart).
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    map: Mutex<BTreeMap<TargetName, Status>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing statuses.
    pub fn with_statuses<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = (S, Status)>,
        S: Into<TargetName>,
    {
        let map = statuses.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            map: Mutex::new(map),
        }
    }

    fn lock(&self, target: &str) -> Result<MutexGuard<'_, BTreeMap<TargetName, Status>>> {
        self.map
            .lock()
            .map_err(|_| GeocompileError::persistence(target, anyhow!("status map lock poisoned")))
    }
}

impl StatusStore for MemoryStatusStore {
    fn load_status(&self, target: &str) -> Result<Status> {
        Ok(self.lock(target)?.get(target).copied().unwrap_or(Status::Unknown))
    }

    fn save_status(&self, target: &str, status: Status) -> Result<()> {
        self.lock(target)?.insert(target.to_string(), status);
        debug!(target_name = %target, status = %status, "stored status (memory)");
        Ok(())
    }

    fn snapshot(&self) -> Result<BTreeMap<TargetName, Status>> {
        Ok(self.lock("*")?.clone())
    }
}
