// src/program/snapshot.rs

//! Immutable whole-program snapshot handed to the builder by the host.

use std::collections::HashMap;

use tracing::warn;

use crate::graph::DependencyRef;
use crate::signature::compute_version;
use crate::types::{UnitPath, normalize_unit_path};

/// One unit as seen by the host when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: UnitPath,
    /// Hash of the unit's full text.
    pub version: String,
    pub dependencies: Vec<DependencyRef>,
    pub affects_global_scope: bool,
}

impl SourceUnit {
    /// Describe a unit from its text; the version is derived from the text.
    pub fn from_text(path: &str, text: &str) -> Self {
        Self {
            path: normalize_unit_path(path),
            version: compute_version(text),
            dependencies: Vec::new(),
            affects_global_scope: false,
        }
    }

    pub fn with_dependency(mut self, dep: DependencyRef) -> Self {
        self.dependencies.push(DependencyRef {
            path: normalize_unit_path(&dep.path),
            reexported: dep.reexported,
        });
        self
    }

    pub fn with_global_scope(mut self, affects: bool) -> Self {
        self.affects_global_scope = affects;
        self
    }
}

/// The set of units making up the program at one point in time.
///
/// Never mutated after construction; the builder reads it once per
/// recreation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramSnapshot {
    units: Vec<SourceUnit>,
    /// Position of each unit in `units`, by path.
    index: HashMap<UnitPath, usize>,
}

impl ProgramSnapshot {
    /// Build a snapshot; a path listed twice keeps its first occurrence.
    pub fn new(units: Vec<SourceUnit>) -> Self {
        let mut index: HashMap<UnitPath, usize> = HashMap::with_capacity(units.len());
        let mut kept = Vec::with_capacity(units.len());
        for unit in units {
            if index.contains_key(&unit.path) {
                warn!(unit = %unit.path, "duplicate unit in program snapshot; keeping first");
                continue;
            }
            index.insert(unit.path.clone(), kept.len());
            kept.push(unit);
        }
        Self { units: kept, index }
    }

    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    pub fn unit(&self, path: &str) -> Option<&SourceUnit> {
        self.index.get(path).map(|&i| &self.units[i])
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
