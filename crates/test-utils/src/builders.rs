#![allow(dead_code)]

use std::collections::BTreeMap;

use geocompile::config::{ConfigFile, ConfigSection, KindConfig, RawConfigFile, TargetConfig};
use geocompile::dag::IdSpec;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                kind: BTreeMap::new(),
                target: BTreeMap::new(),
            },
        }
    }

    /// Register a simple kind whose command is `echo <name>`.
    pub fn with_simple_kind(self, name: &str) -> Self {
        self.with_kind(name, KindConfigBuilder::new(&format!("echo {name}")).build())
    }

    /// Register a complex kind (it has a merge command).
    pub fn with_complex_kind(self, name: &str) -> Self {
        self.with_kind(
            name,
            KindConfigBuilder::new(&format!("echo {name}"))
                .merge(&format!("echo merge {name}"))
                .build(),
        )
    }

    pub fn with_kind(mut self, name: &str, kind: KindConfig) -> Self {
        self.config.kind.insert(name.to_string(), kind);
        self
    }

    pub fn with_target(mut self, name: &str, target: TargetConfig) -> Self {
        self.config.target.insert(name.to_string(), target);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.config.workers = workers;
        self
    }

    pub fn forced(mut self, name: &str) -> Self {
        self.config.config.forced.push(name.to_string());
        self
    }

    /// The raw, unvalidated config (for validation tests).
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `KindConfig`.
pub struct KindConfigBuilder {
    kind: KindConfig,
}

impl KindConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            kind: KindConfig {
                cmd: cmd.to_string(),
                clean: None,
                merge: None,
                clean_all: None,
            },
        }
    }

    pub fn clean(mut self, cmd: &str) -> Self {
        self.kind.clean = Some(cmd.to_string());
        self
    }

    pub fn merge(mut self, cmd: &str) -> Self {
        self.kind.merge = Some(cmd.to_string());
        self
    }

    pub fn clean_all(mut self, cmd: &str) -> Self {
        self.kind.clean_all = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> KindConfig {
        self.kind
    }
}

/// Builder for `TargetConfig`.
pub struct TargetConfigBuilder {
    target: TargetConfig,
}

impl TargetConfigBuilder {
    pub fn new(kind: &str) -> Self {
        Self {
            target: TargetConfig {
                kind: kind.to_string(),
                after: vec![],
                ids: None,
                chunk_size: None,
                params: BTreeMap::new(),
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.target.after.push(dep.to_string());
        self
    }

    pub fn span(mut self, min: i64, max: i64, chunk_size: usize) -> Self {
        self.target.ids = Some(IdSpec::Span { min, max });
        self.target.chunk_size = Some(chunk_size);
        self
    }

    pub fn ids(mut self, ids: &[i64], chunk_size: usize) -> Self {
        self.target.ids = Some(IdSpec::List(ids.to_vec()));
        self.target.chunk_size = Some(chunk_size);
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.target.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> TargetConfig {
        self.target
    }
}
