// src/config/mod.rs

//! Project configuration (`Incbuild.toml`): data model, loading and
//! validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, UnitsSection};
pub use validate::validate_raw_config;
