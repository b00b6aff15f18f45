// src/project/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::UnitsSection;
use crate::fs::FileSystem;
use crate::types::{UnitPath, normalize_unit_path};

/// Compiled `[units]` include/exclude patterns.
///
/// Patterns are relative to the project root; [`UnitMatcher::matches`] takes
/// root-relative paths with forward slashes (e.g. `"src/app/main.unit"`).
#[derive(Clone)]
pub struct UnitMatcher {
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for UnitMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitMatcher")
            .field("include", &self.include_set.len())
            .field("exclude", &self.exclude_set.as_ref().map(GlobSet::len))
            .finish()
    }
}

impl UnitMatcher {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include_set = build_globset(include).context("building include globset")?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };
        Ok(Self {
            include_set,
            exclude_set,
        })
    }

    pub fn from_config(units: &UnitsSection) -> Result<Self> {
        Self::new(&units.include, &units.exclude)
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Root-relative unit path of `path`, if it lies under `root`.
pub fn unit_path_under(root: &Path, path: &Path) -> Option<UnitPath> {
    let rel = path.strip_prefix(root).ok()?;
    Some(normalize_unit_path(&rel.to_string_lossy()))
}

/// Every file under `root` accepted by `matcher`, as sorted unit paths.
pub fn collect_matching_units(
    fs: &dyn FileSystem,
    root: &Path,
    matcher: &UnitMatcher,
) -> Result<Vec<UnitPath>> {
    let mut units = Vec::new();
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Some(unit) = unit_path_under(root, &path) {
                    if matcher.matches(&unit) {
                        units.push(unit);
                    }
                }
            }
        }
    }

    units.sort();
    Ok(units)
}
