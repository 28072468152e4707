// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::TargetGraph;
use crate::errors::{GeocompileError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = GeocompileError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.kind, raw.target))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_targets(cfg)?;
    validate_global_config(cfg)?;
    validate_target_kinds(cfg)?;
    validate_target_dependencies(cfg)?;
    validate_complex_targets(cfg)?;
    validate_graph(cfg)?;
    Ok(())
}

fn ensure_has_targets(cfg: &RawConfigFile) -> Result<()> {
    if cfg.target.is_empty() {
        return Err(GeocompileError::ConfigError(
            "config must contain at least one [target.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(GeocompileError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }

    for name in cfg.config.forced.iter() {
        if !cfg.target.contains_key(name) {
            return Err(GeocompileError::ConfigError(format!(
                "[config].forced names unknown target '{}'",
                name
            )));
        }
    }

    Ok(())
}

fn validate_target_kinds(cfg: &RawConfigFile) -> Result<()> {
    for (name, target) in cfg.target.iter() {
        if !cfg.kind.contains_key(&target.kind) {
            return Err(GeocompileError::ConfigError(format!(
                "target '{}' has unknown kind '{}'",
                name, target.kind
            )));
        }
    }
    Ok(())
}

fn validate_target_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, target) in cfg.target.iter() {
        for dep in target.after.iter() {
            if !cfg.target.contains_key(dep) {
                return Err(GeocompileError::ConfigError(format!(
                    "target '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(GeocompileError::ConfigError(format!(
                    "target '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_complex_targets(cfg: &RawConfigFile) -> Result<()> {
    for (name, target) in cfg.target.iter() {
        let complex = cfg.kind.get(&target.kind).is_some_and(|k| k.is_complex());
        if !complex {
            continue;
        }

        if target.ids.is_none() {
            return Err(GeocompileError::ConfigError(format!(
                "complex target '{}' needs `ids` to split on",
                name
            )));
        }
        match target.chunk_size {
            Some(n) if n >= 1 => {}
            Some(_) => {
                return Err(GeocompileError::PartitionInvariant(format!(
                    "target '{}' has chunk_size 0",
                    name
                )));
            }
            None => {
                return Err(GeocompileError::ConfigError(format!(
                    "complex target '{}' needs `chunk_size`",
                    name
                )));
            }
        }

        // Subtarget statuses share the store's key space with targets.
        for sub in target.to_target(name).split_by_ids()? {
            if cfg.target.contains_key(&sub.name) {
                return Err(GeocompileError::ConfigError(format!(
                    "subtarget '{}' of complex target '{}' clashes with target '{}'",
                    sub.name, name, sub.name
                )));
            }
        }
    }
    Ok(())
}

/// Build the target graph once so duplicate and cycle errors surface here.
fn validate_graph(cfg: &RawConfigFile) -> Result<()> {
    TargetGraph::from_target_configs(&cfg.target).map(|_| ())
}
