// src/state/builder_state.rs

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::errors::{IncbuildError, Result};
use crate::graph::{DependencyGraph, UnitId};
use crate::program::ProgramSnapshot;
use crate::signature::Signature;
use crate::state::unit_info::UnitInfo;
use crate::types::UnitPath;

/// Root aggregate of the incremental builder.
///
/// Unit records are stored in a table parallel to the graph's unit arena, so
/// every unit of the program has exactly one record and every graph node has
/// a record by construction.
#[derive(Debug, Clone, Default)]
pub struct BuilderState {
    graph: DependencyGraph,
    infos: Vec<UnitInfo>,
    /// Last signature of units whose text changed since they were last
    /// checked. The next check compares against it.
    last_known: HashMap<UnitId, Signature>,
    /// Units re-signed since this state was created.
    seen_signature_updates: HashSet<UnitId>,
}

/// Difference between a state and the state it was derived from.
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    /// Units that are new or whose version differs, in unit order.
    pub changed: Vec<UnitId>,
    /// Number of entries in `changed` that did not exist before.
    pub added: usize,
    /// Paths present before but gone now.
    pub removed: Vec<UnitPath>,
    /// Surviving units that depended on a removed unit.
    pub dependents_of_removed: Vec<UnitId>,
    /// Changed units that affected the global scope before or after the change.
    pub global_roots: HashSet<UnitId>,
    /// A removed unit affected the global scope.
    pub removed_global: bool,
}

impl BuilderState {
    /// State for an empty program.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the state for `snapshot`, carrying forward records of units whose
    /// version is unchanged relative to `prior`.
    pub fn from_snapshot(
        snapshot: &ProgramSnapshot,
        tracking: bool,
        prior: Option<&BuilderState>,
    ) -> (Self, StateDelta) {
        let graph = DependencyGraph::build(
            snapshot
                .units()
                .iter()
                .map(|unit| (unit.path.as_str(), unit.dependencies.as_slice())),
            tracking,
        );

        let mut carried = 0usize;
        let mut last_known: HashMap<UnitId, Signature> = HashMap::new();
        let infos: Vec<UnitInfo> = snapshot
            .units()
            .iter()
            .map(|unit| {
                let previous = prior.and_then(|p| p.info_by_path(&unit.path));
                let info = match previous {
                    Some(prev) if prev.version == unit.version => {
                        carried += 1;
                        prev.clone()
                    }
                    _ => UnitInfo::unchecked(unit.version.clone(), unit.affects_global_scope),
                };
                if !info.signature.is_signatured() {
                    let known = prior.and_then(|p| p.last_known_signature(&unit.path));
                    if let (Some(id), Some(signature)) = (graph.unit_id(&unit.path), known) {
                        last_known.insert(id, signature);
                    }
                }
                info
            })
            .collect();

        let state = Self {
            graph,
            infos,
            last_known,
            seen_signature_updates: HashSet::new(),
        };

        let delta = match prior {
            Some(prior) => state.diff(prior),
            None => state.diff(&BuilderState::empty()),
        };

        info!(
            units = state.len(),
            carried,
            changed = delta.changed.len(),
            removed = delta.removed.len(),
            "builder state rebuilt from program snapshot"
        );
        (state, delta)
    }

    /// Reassemble a state from a graph and its unit records, e.g. when
    /// decoding a build info document.
    pub fn from_parts(graph: DependencyGraph, infos: Vec<UnitInfo>) -> Result<Self> {
        if graph.len() != infos.len() {
            return Err(IncbuildError::BuildInfoMalformed(format!(
                "{} unit records for {} graph units",
                infos.len(),
                graph.len()
            )));
        }
        Ok(Self {
            graph,
            infos,
            last_known: HashMap::new(),
            seen_signature_updates: HashSet::new(),
        })
    }

    /// Compare against a prior state, matching units by path.
    pub fn diff(&self, prior: &BuilderState) -> StateDelta {
        let mut delta = StateDelta::default();

        for id in self.graph.units() {
            let info = &self.infos[id.index()];
            match prior.info_by_path(self.graph.path_of(id)) {
                Some(old) if old.version == info.version => {}
                Some(old) => {
                    delta.changed.push(id);
                    if old.affects_global_scope || info.affects_global_scope {
                        delta.global_roots.insert(id);
                    }
                }
                None => {
                    delta.changed.push(id);
                    delta.added += 1;
                    if info.affects_global_scope {
                        delta.global_roots.insert(id);
                    }
                }
            }
        }

        let mut orphaned: HashSet<UnitId> = HashSet::new();
        for old_id in prior.graph.units() {
            let old_path = prior.graph.path_of(old_id);
            if self.graph.contains(old_path) {
                continue;
            }
            delta.removed.push(old_path.to_string());
            if prior.infos[old_id.index()].affects_global_scope {
                delta.removed_global = true;
            }
            for dependent in prior.graph.dependents_of(old_id).iter() {
                if let Some(id) = self.graph.unit_id(prior.graph.path_of(*dependent)) {
                    orphaned.insert(id);
                }
            }
        }
        let mut orphaned: Vec<UnitId> = orphaned.into_iter().collect();
        orphaned.sort();
        delta.dependents_of_removed = orphaned;

        if !delta.removed.is_empty() {
            debug!(removed = ?delta.removed, "units removed from program");
        }
        delta
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn info(&self, id: UnitId) -> &UnitInfo {
        &self.infos[id.index()]
    }

    pub fn info_by_path(&self, path: &str) -> Option<&UnitInfo> {
        self.graph.unit_id(path).map(|id| &self.infos[id.index()])
    }

    pub fn path_of(&self, id: UnitId) -> &str {
        self.graph.path_of(id)
    }

    /// `(path, record)` pairs in unit order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &UnitInfo)> {
        self.graph
            .units()
            .map(move |id| (self.graph.path_of(id), &self.infos[id.index()]))
    }

    /// Signature to compare the next check of `path` against: the current
    /// one, or the one it had before its text last changed.
    pub fn last_known_signature(&self, path: &str) -> Option<Signature> {
        let id = self.graph.unit_id(path)?;
        let info = &self.infos[id.index()];
        if info.signature.is_signatured() {
            return Some(info.signature.clone());
        }
        self.last_known.get(&id).cloned()
    }

    /// Store the signature computed by the latest check of `id`.
    ///
    /// Returns whether dependents must be re-examined: the signature moved
    /// relative to the last known one, or either side is absent.
    pub fn update_signature(&mut self, id: UnitId, signature: Signature) -> bool {
        let stale = self.last_known.remove(&id);
        let info = &mut self.infos[id.index()];
        let changed = match (&info.signature, stale) {
            (Signature::Unsignatured, Some(old)) => old.differs_from(&signature),
            (current, _) => current.differs_from(&signature),
        };
        debug!(
            unit = %self.graph.path_of(id),
            changed,
            signatured = signature.is_signatured(),
            "updating unit signature"
        );
        info.signature = signature;
        self.seen_signature_updates.insert(id);
        changed
    }

    pub fn has_updated_signature(&self, id: UnitId) -> bool {
        self.seen_signature_updates.contains(&id)
    }

    pub fn signature_updates(&self) -> usize {
        self.seen_signature_updates.len()
    }
}
