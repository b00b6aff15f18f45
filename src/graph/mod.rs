// src/graph/mod.rs

//! Whole-program dependency graph.
//!
//! Units live in an arena indexed by [`UnitId`]. Ids are only meaningful for
//! the graph that issued them: every program recreation builds a new graph,
//! and anything that must survive across recreations is keyed by path.
//!
//! Two edge sets are kept:
//! - import edges (`dependencies_of` / `dependents_of`);
//! - re-export edges (`exported_dependents_of`), a subset of the import
//!   edges recording which units republish another unit's declarations.
//!
//! The graph is general-directed. Import cycles are legal, so every traversal
//! carries an explicit visited set.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{IncbuildError, Result};
use crate::types::UnitPath;

/// Handle of a unit inside one [`DependencyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u32);

impl UnitId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        UnitId(index as u32)
    }
}

/// A dependency as reported by the program snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyRef {
    pub path: UnitPath,
    /// True when the dependent republishes this dependency's declarations.
    #[serde(default)]
    pub reexported: bool,
}

impl DependencyRef {
    pub fn import(path: impl Into<UnitPath>) -> Self {
        Self {
            path: path.into(),
            reexported: false,
        }
    }

    pub fn reexport(path: impl Into<UnitPath>) -> Self {
        Self {
            path: path.into(),
            reexported: true,
        }
    }
}

/// Adjacency lists, all indexed by `UnitId::index()`.
#[derive(Debug, Clone, Default)]
struct Edges {
    dependencies: Vec<Vec<UnitId>>,
    dependents: Vec<Vec<UnitId>>,
    exported_dependents: Vec<Vec<UnitId>>,
    /// `(from, to)` pairs already present in `dependencies`.
    dependency_pairs: HashSet<(UnitId, UnitId)>,
    /// `(exporter, exported)` pairs already present in `exported_dependents`.
    export_pairs: HashSet<(UnitId, UnitId)>,
}

impl Edges {
    fn with_len(len: usize) -> Self {
        Self {
            dependencies: vec![Vec::new(); len],
            dependents: vec![Vec::new(); len],
            exported_dependents: vec![Vec::new(); len],
            dependency_pairs: HashSet::new(),
            export_pairs: HashSet::new(),
        }
    }

    fn has(&self, from: UnitId, to: UnitId) -> bool {
        self.dependency_pairs.contains(&(from, to))
    }

    fn add(&mut self, from: UnitId, to: UnitId) -> bool {
        if !self.dependency_pairs.insert((from, to)) {
            return false;
        }
        self.dependencies[from.index()].push(to);
        true
    }

    fn add_export(&mut self, from: UnitId, to: UnitId) {
        if self.export_pairs.insert((from, to)) {
            self.exported_dependents[to.index()].push(from);
        }
    }

    /// Derive reverse edges in one pass over the forward lists.
    fn derive_dependents(&mut self) {
        for deps in &mut self.dependents {
            deps.clear();
        }
        for (from, deps) in self.dependencies.iter().enumerate() {
            for to in deps {
                self.dependents[to.index()].push(UnitId::from_index(from));
            }
        }
    }
}

const NO_UNITS: &[UnitId] = &[];

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    paths: Vec<UnitPath>,
    index: HashMap<UnitPath, UnitId>,
    /// `None` when dependency tracking is disabled.
    edges: Option<Edges>,
}

impl DependencyGraph {
    /// Build the graph from each unit's reported dependencies.
    ///
    /// Dependencies naming a unit that is not part of the program are pruned.
    /// Self edges are dropped. When `tracking` is false no edges are kept and
    /// every unit is treated as depending on every other one.
    pub fn build<'a, I>(units: I, tracking: bool) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [DependencyRef])>,
    {
        let units: Vec<(&str, &[DependencyRef])> = units.into_iter().collect();

        let mut graph = Self::with_paths(units.iter().map(|(path, _)| path.to_string()));
        if !tracking {
            debug!(units = graph.len(), "dependency tracking disabled; graph has no edges");
            return graph;
        }

        let mut edges = Edges::with_len(graph.len());
        let mut pruned = 0usize;

        for (from_path, deps) in &units {
            let Some(from) = graph.unit_id(from_path) else {
                continue;
            };
            for dep in deps.iter() {
                let Some(to) = graph.unit_id(&dep.path) else {
                    debug!(unit = %from_path, dep = %dep.path, "pruning edge to unit outside the program");
                    pruned += 1;
                    continue;
                };
                if to == from {
                    continue;
                }
                edges.add(from, to);
                if dep.reexported {
                    edges.add_export(from, to);
                }
            }
        }

        edges.derive_dependents();
        graph.edges = Some(edges);

        debug!(
            units = graph.len(),
            edges = graph.edge_count(),
            pruned,
            "built dependency graph"
        );
        graph
    }

    /// Rebuild a graph from a unit table and index-based edge lists.
    pub fn from_indexed(
        paths: Vec<UnitPath>,
        dependency_edges: &[(u32, u32)],
        export_edges: &[(u32, u32)],
        tracking: bool,
    ) -> Result<Self> {
        let mut graph = Self::with_paths(paths);
        if graph.index.len() != graph.paths.len() {
            return Err(IncbuildError::BuildInfoMalformed(
                "unit table contains duplicate paths".to_string(),
            ));
        }
        if !tracking {
            return Ok(graph);
        }

        let len = graph.len();
        let resolve = |idx: u32| -> Result<UnitId> {
            if (idx as usize) < len {
                Ok(UnitId(idx))
            } else {
                Err(IncbuildError::BuildInfoMalformed(format!(
                    "edge references unit index {idx} but only {len} units exist"
                )))
            }
        };

        let mut edges = Edges::with_len(len);
        for &(from, to) in dependency_edges {
            edges.add(resolve(from)?, resolve(to)?);
        }
        for &(from, to) in export_edges {
            let (from, to) = (resolve(from)?, resolve(to)?);
            if !edges.has(from, to) {
                warn!(
                    from = %graph.paths[from.index()],
                    to = %graph.paths[to.index()],
                    "re-export edge without matching import edge; adding import edge"
                );
                edges.add(from, to);
            }
            edges.add_export(from, to);
        }
        edges.derive_dependents();
        graph.edges = Some(edges);
        Ok(graph)
    }

    fn with_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = UnitPath>,
    {
        let paths: Vec<UnitPath> = paths.into_iter().collect();
        let index = paths
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), UnitId::from_index(i)))
            .collect();
        Self {
            paths,
            index,
            edges: None,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn is_tracking(&self) -> bool {
        self.edges.is_some()
    }

    pub fn unit_id(&self, path: &str) -> Option<UnitId> {
        self.index.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn path_of(&self, id: UnitId) -> &str {
        &self.paths[id.index()]
    }

    /// Unit table in snapshot order.
    pub fn paths(&self) -> &[UnitPath] {
        &self.paths
    }

    pub fn units(&self) -> impl Iterator<Item = UnitId> + '_ {
        (0..self.paths.len()).map(UnitId::from_index)
    }

    fn all_except(&self, id: UnitId) -> Vec<UnitId> {
        self.units().filter(|other| *other != id).collect()
    }

    /// Units `id` imports directly.
    pub fn dependencies_of(&self, id: UnitId) -> Cow<'_, [UnitId]> {
        match &self.edges {
            Some(edges) => Cow::Borrowed(edges.dependencies[id.index()].as_slice()),
            None => Cow::Owned(self.all_except(id)),
        }
    }

    /// Units importing `id` directly.
    pub fn dependents_of(&self, id: UnitId) -> Cow<'_, [UnitId]> {
        match &self.edges {
            Some(edges) => Cow::Borrowed(edges.dependents[id.index()].as_slice()),
            None => Cow::Owned(self.all_except(id)),
        }
    }

    /// Units that re-export declarations of `id`.
    pub fn exported_dependents_of(&self, id: UnitId) -> &[UnitId] {
        match &self.edges {
            Some(edges) => edges.exported_dependents[id.index()].as_slice(),
            None => NO_UNITS,
        }
    }

    /// Transitive dependencies of `id`, starting with `id` itself, in
    /// breadth-first discovery order.
    pub fn all_dependencies_of(&self, id: UnitId) -> Vec<UnitId> {
        let mut seen: HashSet<UnitId> = HashSet::from([id]);
        let mut order = vec![id];
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for dep in self.dependencies_of(current).iter().copied() {
                if seen.insert(dep) {
                    order.push(dep);
                    queue.push_back(dep);
                }
            }
        }
        order
    }

    /// Import edges as `(from, to)` pairs in unit order.
    pub fn dependency_edges(&self) -> Vec<(UnitId, UnitId)> {
        let Some(edges) = &self.edges else {
            return Vec::new();
        };
        edges
            .dependencies
            .iter()
            .enumerate()
            .flat_map(|(from, deps)| deps.iter().map(move |to| (UnitId::from_index(from), *to)))
            .collect()
    }

    /// Re-export edges as `(exporter, exported)` pairs, sorted.
    pub fn export_edges(&self) -> Vec<(UnitId, UnitId)> {
        let Some(edges) = &self.edges else {
            return Vec::new();
        };
        let mut pairs: Vec<(UnitId, UnitId)> = edges
            .exported_dependents
            .iter()
            .enumerate()
            .flat_map(|(to, exporters)| {
                exporters.iter().map(move |from| (*from, UnitId::from_index(to)))
            })
            .collect();
        pairs.sort();
        pairs
    }

    pub fn edge_count(&self) -> usize {
        self.edges
            .as_ref()
            .map(|e| e.dependencies.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Strongly connected components with more than one unit, as paths.
    pub fn import_cycles(&self) -> Vec<Vec<UnitPath>> {
        let mut graph: DiGraphMap<u32, ()> = DiGraphMap::new();
        for id in self.units() {
            graph.add_node(id.0);
        }
        for (from, to) in self.dependency_edges() {
            graph.add_edge(from.0, to.0, ());
        }

        let mut cycles: Vec<Vec<UnitPath>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut paths: Vec<UnitPath> = component
                    .into_iter()
                    .map(|idx| self.paths[idx as usize].clone())
                    .collect();
                paths.sort();
                paths
            })
            .collect();
        cycles.sort();
        cycles
    }
}
