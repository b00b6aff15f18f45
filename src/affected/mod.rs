// src/affected/mod.rs

//! Affected-unit discovery.
//!
//! An [`AffectedPass`] is created for one changed unit and consumed one unit at
//! a time. The changed unit is yielded first. After the caller has rechecked a
//! yielded unit and stored its new signature, it reports back through
//! [`AffectedPass::complete`]; only then are that unit's dependents enqueued,
//! and only if its signature moved. Discovery is breadth-first, so a unit is
//! never yielded before the dependency that caused it to be enqueued has been
//! re-signed.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::graph::{DependencyGraph, UnitId};
use crate::state::UnitInfo;
use crate::types::UnitPath;

/// A unit still owed a recheck, carried across program updates and restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCheck {
    pub unit: UnitPath,
    /// The unit affected the global scope when its change was seen, so its
    /// pass must still mark every unit.
    pub global: bool,
}

impl PendingCheck {
    pub fn new(unit: impl Into<UnitPath>, global: bool) -> Self {
        Self {
            unit: unit.into(),
            global,
        }
    }
}

/// Whether an edit needs a pass at all.
///
/// An edit that leaves the bytes unchanged affects nothing, unless the caller
/// forces everything (e.g. after an options change that can alter how
/// unchanged text checks).
pub fn needs_pass(previous: Option<&UnitInfo>, current: &UnitInfo, force_all: bool) -> bool {
    if force_all {
        return true;
    }
    match previous {
        Some(prev) => prev.version != current.version,
        None => true,
    }
}

/// Propagation state for one changed unit.
#[derive(Debug, Clone)]
pub struct AffectedPass {
    root: UnitId,
    /// The root affects the global scope (before or after the edit).
    global: bool,
    queue: VecDeque<UnitId>,
    visited: HashSet<UnitId>,
    in_flight: Option<UnitId>,
    /// Re-exporters of a unit whose signature moved; their shape is treated as
    /// moved too, whatever their own signature says.
    leaking: HashSet<UnitId>,
    yielded: Vec<UnitId>,
}

impl AffectedPass {
    pub fn start(root: UnitId, global: bool) -> Self {
        Self {
            root,
            global,
            queue: VecDeque::from([root]),
            visited: HashSet::from([root]),
            in_flight: None,
            leaking: HashSet::new(),
            yielded: Vec::new(),
        }
    }

    pub fn root(&self) -> UnitId {
        self.root
    }

    /// Whether rechecking `unit` in this pass marks every unit.
    pub fn marks_everything(&self, unit: UnitId) -> bool {
        self.global && unit == self.root
    }

    /// Units yielded so far, in order.
    pub fn yielded(&self) -> &[UnitId] {
        &self.yielded
    }

    /// Units still owed processing: the in-flight unit, then the queue.
    pub fn remaining(&self) -> Vec<UnitId> {
        self.in_flight
            .iter()
            .copied()
            .chain(self.queue.iter().copied())
            .collect()
    }

    /// Next unit to recheck, or `None` once propagation is exhausted.
    ///
    /// Units in `processed` were already rechecked against the current
    /// program and are passed over. Asking again before completing the
    /// in-flight unit yields that same unit.
    pub fn next_affected(&mut self, processed: &HashSet<UnitId>) -> Option<UnitId> {
        if let Some(unit) = self.in_flight {
            return Some(unit);
        }
        while let Some(unit) = self.queue.pop_front() {
            if processed.contains(&unit) {
                debug!(unit = unit.index(), "already processed against this program; skipping");
                continue;
            }
            self.in_flight = Some(unit);
            self.yielded.push(unit);
            return Some(unit);
        }
        None
    }

    /// Record the outcome of rechecking `unit`.
    ///
    /// `signature_changed` is the result of comparing the old and new
    /// signature. Every unit newly enqueued is passed to `on_enqueue` before
    /// this returns, so callers can drop stale cached data synchronously.
    pub fn complete<F>(
        &mut self,
        graph: &DependencyGraph,
        info: &UnitInfo,
        unit: UnitId,
        signature_changed: bool,
        processed: &HashSet<UnitId>,
        mut on_enqueue: F,
    ) where
        F: FnMut(UnitId),
    {
        if self.in_flight == Some(unit) {
            self.in_flight = None;
        }

        let moved = signature_changed || self.leaking.contains(&unit);
        let everything = !graph.is_tracking()
            || self.marks_everything(unit)
            || (moved && info.affects_global_scope);

        let candidates: Vec<UnitId> = if everything {
            graph.units().collect()
        } else if moved {
            for exporter in graph.exported_dependents_of(unit) {
                self.leaking.insert(*exporter);
            }
            graph.dependents_of(unit).into_owned()
        } else {
            debug!(
                unit = unit.index(),
                "signature unchanged; not propagating to dependents"
            );
            return;
        };

        let mut enqueued = 0usize;
        for candidate in candidates {
            if processed.contains(&candidate) || !self.visited.insert(candidate) {
                continue;
            }
            on_enqueue(candidate);
            self.queue.push_back(candidate);
            enqueued += 1;
        }

        debug!(
            unit = unit.index(),
            everything,
            enqueued,
            queued = self.queue.len(),
            "propagated change to dependents"
        );
    }
}
