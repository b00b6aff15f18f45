// src/cache/mod.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::diagnostics::Diagnostic;
use crate::state::BuilderState;
use crate::types::UnitPath;

#[derive(Debug, Clone)]
struct CacheEntry {
    /// Version of the unit text the diagnostics were computed against.
    version: String,
    diagnostics: Arc<[Diagnostic]>,
}

/// Per-unit semantic diagnostics from the last check.
///
/// Keyed by path so entries survive program recreation. An entry exists only
/// while the unit's diagnostics are known to be current: it is dropped the
/// moment the unit is scheduled for a recheck.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsCache {
    entries: HashMap<UnitPath, CacheEntry>,
}

impl DiagnosticsCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, unit: &str) -> Option<Arc<[Diagnostic]>> {
        self.entries.get(unit).map(|e| Arc::clone(&e.diagnostics))
    }

    /// Drop the cached diagnostics of `unit`.
    pub fn invalidate(&mut self, unit: &str) {
        if self.entries.remove(unit).is_some() {
            debug!(unit = %unit, "invalidated cached diagnostics");
        }
    }

    /// Store fresh diagnostics for `unit` checked at `version`.
    pub fn commit(&mut self, unit: &str, version: &str, diagnostics: Vec<Diagnostic>) -> Arc<[Diagnostic]> {
        let diagnostics: Arc<[Diagnostic]> = diagnostics.into();
        self.entries.insert(
            unit.to_string(),
            CacheEntry {
                version: version.to_string(),
                diagnostics: Arc::clone(&diagnostics),
            },
        );
        diagnostics
    }

    /// Keep only entries whose unit still exists in `state` at the version the
    /// entry was computed against. Returns how many entries were reused.
    pub fn retain_current(&mut self, state: &BuilderState) -> usize {
        let before = self.entries.len();
        self.entries.retain(|unit, entry| {
            state
                .info_by_path(unit)
                .is_some_and(|info| info.version == entry.version)
        });
        let kept = self.entries.len();
        if kept < before {
            debug!(dropped = before - kept, kept, "dropped stale cached diagnostics");
        }
        kept
    }

    /// Cached `(unit, version, diagnostics)` triples, sorted by unit.
    pub fn iter_sorted(&self) -> Vec<(&str, &str, &[Diagnostic])> {
        let mut out: Vec<(&str, &str, &[Diagnostic])> = self
            .entries
            .iter()
            .map(|(unit, e)| (unit.as_str(), e.version.as_str(), &*e.diagnostics))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
