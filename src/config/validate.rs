// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{IncbuildError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = IncbuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.units))
    }
}

pub fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_includes(cfg)?;
    validate_patterns(cfg)?;
    validate_paths(cfg)?;
    Ok(())
}

fn ensure_has_includes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.units.include.iter().all(|p| p.trim().is_empty()) {
        return Err(IncbuildError::ConfigError(
            "[units].include must contain at least one pattern".to_string(),
        ));
    }
    Ok(())
}

fn validate_patterns(cfg: &RawConfigFile) -> Result<()> {
    let all = cfg
        .units
        .include
        .iter()
        .map(|p| ("include", p))
        .chain(cfg.units.exclude.iter().map(|p| ("exclude", p)));

    for (section, pattern) in all {
        if let Err(e) = Glob::new(pattern) {
            return Err(IncbuildError::ConfigError(format!(
                "invalid glob in [units].{section}: '{pattern}': {e}"
            )));
        }
    }
    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.out_dir.as_os_str().is_empty() {
        return Err(IncbuildError::ConfigError(
            "[config].out_dir must not be empty".to_string(),
        ));
    }
    if cfg.config.build_info.as_os_str().is_empty() {
        return Err(IncbuildError::ConfigError(
            "[config].build_info must not be empty".to_string(),
        ));
    }
    Ok(())
}
