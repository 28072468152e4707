// src/config/mod.rs

//! Build description loading and validation.
//!
//! - [`model`] holds the serde types for `Geocompile.toml`.
//! - [`loader`] reads the file.
//! - [`validate`] turns a `RawConfigFile` into a `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, status_file_path};
pub use model::{ConfigFile, ConfigSection, KindConfig, RawConfigFile, TargetConfig};
