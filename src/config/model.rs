// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::program::BuilderOptions;
use crate::types::BuildInfoStorageMode;

/// Project configuration as read from TOML, before validation.
///
/// ```toml
/// [config]
/// dependency_tracking = true
/// emit_declarations = true
/// include_inferred_types = true
/// persist_diagnostics = true
/// build_info = ".incbuild/buildinfo.json"
/// build_info_storage = "file"
/// out_dir = "out"
///
/// [units]
/// include = ["src/**/*.unit"]
/// exclude = ["src/**/scratch/**"]
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub units: UnitsSection,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub units: UnitsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, units: UnitsSection) -> Self {
        Self { config, units }
    }

    pub fn builder_options(&self) -> BuilderOptions {
        BuilderOptions {
            dependency_tracking: self.config.dependency_tracking,
            emit_declarations: self.config.emit_declarations,
            persist_diagnostics: self.config.persist_diagnostics,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// When false, any change rechecks the whole program.
    #[serde(default = "default_true")]
    pub dependency_tracking: bool,

    /// Re-emit declaration output of dependents whose public shape moved.
    #[serde(default = "default_true")]
    pub emit_declarations: bool,

    /// Whether inferred declarations count toward a unit's signature.
    #[serde(default = "default_true")]
    pub include_inferred_types: bool,

    /// Store cached diagnostics in the build info document.
    #[serde(default = "default_true")]
    pub persist_diagnostics: bool,

    /// Build info document location, relative to the project root.
    #[serde(default = "default_build_info")]
    pub build_info: PathBuf,

    #[serde(default)]
    pub build_info_storage: BuildInfoStorageMode,

    /// Output directory for emitted files, relative to the project root.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_build_info() -> PathBuf {
    PathBuf::from(".incbuild/buildinfo.json")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("out")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            dependency_tracking: true,
            emit_declarations: true,
            include_inferred_types: true,
            persist_diagnostics: true,
            build_info: default_build_info(),
            build_info_storage: BuildInfoStorageMode::default(),
            out_dir: default_out_dir(),
        }
    }
}

/// `[units]` section: which files make up the program.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitsSection {
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_include() -> Vec<String> {
    vec!["src/**/*.unit".to_string()]
}

impl Default for UnitsSection {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: Vec::new(),
        }
    }
}
