// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::dag::{IdSpec, Target};
use crate::engine::RunOptions;
use crate::store::DEFAULT_STATUS_FILE;

/// Build description as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// workers = 4
///
/// [kind.import]
/// cmd = "ogr2ogr ..."
///
/// [kind.tiles]
/// cmd = "render --min $GEOCOMPILE_MIN --max $GEOCOMPILE_MAX"
/// merge = "render --merge"
///
/// [target.boundaries]
/// kind = "import"
///
/// [target.roads]
/// kind = "tiles"
/// after = ["boundaries"]
/// ids = { min = 1, max = 23 }
/// chunk_size = 10
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Build steps by kind, from `[kind.<name>]`.
    #[serde(default)]
    pub kind: BTreeMap<String, KindConfig>,

    /// Targets by name, from `[target.<name>]`.
    #[serde(default)]
    pub target: BTreeMap<String, TargetConfig>,
}

/// Validated configuration. Obtain one with `ConfigFile::try_from(raw)` or
/// [`load_and_validate`](crate::config::load_and_validate).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub kind: BTreeMap<String, KindConfig>,
    pub target: BTreeMap<String, TargetConfig>,
}

impl ConfigFile {
    /// Assemble without validation; callers must have validated the parts.
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        kind: BTreeMap<String, KindConfig>,
        target: BTreeMap<String, TargetConfig>,
    ) -> Self {
        Self {
            config,
            kind,
            target,
        }
    }

    /// Run options implied by the `[config]` section.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            workers: self.config.workers,
            forced: self.config.forced.clone(),
            targets: Vec::new(),
        }
    }

    /// Whether `name` refers to a target of a complex kind.
    pub fn is_complex_target(&self, name: &str) -> bool {
        self.target
            .get(name)
            .and_then(|t| self.kind.get(&t.kind))
            .is_some_and(KindConfig::is_complex)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of build steps running at once.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Status file, relative to the config file's directory.
    #[serde(default = "default_status_file")]
    pub status_file: String,

    /// Targets rebuilt on every run regardless of status.
    #[serde(default)]
    pub forced: Vec<String>,
}

fn default_workers() -> usize {
    4
}

fn default_status_file() -> String {
    DEFAULT_STATUS_FILE.to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            status_file: default_status_file(),
            forced: Vec::new(),
        }
    }
}

/// `[kind.<name>]` section: the commands implementing one target kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KindConfig {
    /// Compiles a target, or one subtarget of a complex target.
    pub cmd: String,

    #[serde(default)]
    pub clean: Option<String>,

    /// Presence makes the kind complex.
    #[serde(default)]
    pub merge: Option<String>,

    /// Removes every partition at once; complex kinds only.
    #[serde(default)]
    pub clean_all: Option<String>,
}

impl KindConfig {
    pub fn is_complex(&self) -> bool {
        self.merge.is_some()
    }
}

/// `[target.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub kind: String,

    /// Prerequisites: this target is built after all of them are up to date.
    #[serde(default)]
    pub after: Vec<String>,

    /// Id domain to split on (complex kinds).
    #[serde(default)]
    pub ids: Option<IdSpec>,

    /// Maximum ids per subtarget (complex kinds).
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Free-form parameters passed to the build step.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl TargetConfig {
    pub fn to_target(&self, name: &str) -> Target {
        Target {
            name: name.to_string(),
            kind: self.kind.clone(),
            params: self.params.clone(),
            ids: self.ids.clone(),
            chunk_size: self.chunk_size,
        }
    }
}
