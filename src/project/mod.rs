// src/project/mod.rs

//! On-disk projects written in the bundled `.unit` language.

pub mod disk_host;
pub mod patterns;
pub mod source;

pub use disk_host::DiskCompilerHost;
pub use patterns::{UnitMatcher, collect_matching_units, unit_path_under};
pub use source::{ParsedUnit, UnitParser};
