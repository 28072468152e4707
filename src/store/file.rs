// src/store/file.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dag::{Status, TargetName};
use crate::errors::{GeocompileError, Result};
use crate::fs::{FileSystem, RealFileSystem};

use super::StatusStore;

/// Default location of the status file, relative to the config directory.
pub const DEFAULT_STATUS_FILE: &str = ".geocompile/status.toml";

/// On-disk layout:
///
/// ```toml
/// [status]
/// boundaries = "UPTODATE"
/// roads = "INCOMPLETE"
/// roads_1_10 = "UPTODATE"
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
struct StatusFile {
    #[serde(default)]
    status: BTreeMap<TargetName, Status>,
}

/// Stores statuses in a TOML file.
///
/// The file is read once, on first access; afterwards the in-memory copy is
/// authoritative and every save that changes a status rewrites the file
/// (write to a sibling temp file, then rename over the original).
///
/// A rewrite costs time proportional to the number of stored names, so a
/// build of `n` subtargets writes `O(n^2)` bytes in total. Callers on an
/// async runtime should save from a blocking thread.
#[derive(Debug)]
pub struct FileStatusStore<F: FileSystem = RealFileSystem> {
    fs: F,
    path: PathBuf,
    cache: Mutex<Option<BTreeMap<TargetName, Status>>>,
}

impl FileStatusStore<RealFileSystem> {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_fs(RealFileSystem, path)
    }
}

impl<F: FileSystem> FileStatusStore<F> {
    pub fn with_fs(fs: F, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the cache, loading the file on first use.
    fn loaded(
        &self,
        target: &str,
    ) -> Result<MutexGuard<'_, Option<BTreeMap<TargetName, Status>>>> {
        let mut guard = self
            .cache
            .lock()
            .map_err(|_| GeocompileError::persistence(target, anyhow!("status cache lock poisoned")))?;

        if guard.is_none() {
            let map = self
                .read_file()
                .map_err(|e| GeocompileError::persistence(target, e))?;
            info!(path = ?self.path, entries = map.len(), "loaded status file");
            *guard = Some(map);
        }

        Ok(guard)
    }

    fn read_file(&self) -> anyhow::Result<BTreeMap<TargetName, Status>> {
        if !self.fs.exists(&self.path) {
            return Ok(BTreeMap::new());
        }
        let contents = self.fs.read_to_string(&self.path)?;
        let file: StatusFile = toml::from_str(&contents)
            .with_context(|| format!("parsing status file {:?}", self.path))?;
        Ok(file.status)
    }

    fn write_file(&self, map: &BTreeMap<TargetName, Status>) -> anyhow::Result<()> {
        let file = StatusFile {
            status: map.clone(),
        };
        let contents = toml::to_string(&file).context("serializing status file")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        self.fs.write(&tmp, contents.as_bytes())?;
        self.fs.rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl<F: FileSystem> StatusStore for FileStatusStore<F> {
    fn load_status(&self, target: &str) -> Result<Status> {
        let guard = self.loaded(target)?;
        Ok(guard
            .as_ref()
            .and_then(|map| map.get(target).copied())
            .unwrap_or(Status::Unknown))
    }

    fn save_status(&self, target: &str, status: Status) -> Result<()> {
        let mut guard = self.loaded(target)?;
        let Some(map) = guard.as_mut() else {
            return Err(GeocompileError::persistence(target, anyhow!("status cache not loaded")));
        };

        let previous = map.insert(target.to_string(), status);
        if previous == Some(status) {
            return Ok(());
        }
        if let Err(err) = self.write_file(map) {
            // Keep memory and disk in agreement.
            match previous {
                Some(prev) => map.insert(target.to_string(), prev),
                None => map.remove(target),
            };
            return Err(GeocompileError::persistence(target, err));
        }

        debug!(target_name = %target, status = %status, "stored status (file)");
        Ok(())
    }

    fn snapshot(&self) -> Result<BTreeMap<TargetName, Status>> {
        let guard = self.loaded("*")?;
        Ok(guard.as_ref().cloned().unwrap_or_default())
    }
}
