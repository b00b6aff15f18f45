// src/program/builder.rs

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::affected::{AffectedPass, PendingCheck, needs_pass};
use crate::build_info::{BuildInfo, BuildInfoCodec, BuildInfoInput, DecodedBuildInfo};
use crate::cache::DiagnosticsCache;
use crate::diagnostics::Diagnostic;
use crate::errors::{IncbuildError, Result};
use crate::graph::UnitId;
use crate::program::emit::{PendingEmit, PendingEmitQueue};
use crate::program::host::{CompilerHost, EmitOutput};
use crate::program::options::{BuilderOptions, CancellationToken};
use crate::program::snapshot::ProgramSnapshot;
use crate::signature::{Signature, compute_signature};
use crate::state::{BuilderState, UnitInfo};
use crate::types::{EmitKind, UnitPath, normalize_unit_path};

/// Where the builder is in its current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderPhase {
    /// A program was (re)created and nothing was pulled yet.
    Created,
    IteratingAffectedFiles,
    /// All affected units were rechecked; emits are still pending.
    FullyChecked,
    EmitPending,
    Done,
}

/// Diagnostics of one rechecked unit.
#[derive(Debug, Clone, PartialEq)]
pub struct AffectedDiagnostics {
    pub unit: UnitPath,
    pub diagnostics: Arc<[Diagnostic]>,
}

/// Result of one emit step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedEmit {
    pub unit: UnitPath,
    pub kind: EmitKind,
    pub written_files: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRoot {
    unit: UnitId,
    global: bool,
}

/// Roots in first-seen order. A unit listed twice keeps one entry, global if
/// any of its listings was.
fn merge_roots(candidates: impl IntoIterator<Item = PendingRoot>) -> Vec<PendingRoot> {
    let mut position: HashMap<UnitId, usize> = HashMap::new();
    let mut roots: Vec<PendingRoot> = Vec::new();
    for root in candidates {
        match position.get(&root.unit) {
            Some(&i) => roots[i].global |= root.global,
            None => {
                position.insert(root.unit, roots.len());
                roots.push(root);
            }
        }
    }
    roots
}

/// Incremental driver over a [`CompilerHost`].
///
/// Holds the builder state, the diagnostics cache and the pending-emit queue
/// for the current program, and hands out affected units one at a time.
pub struct BuilderProgram<H: CompilerHost> {
    host: H,
    options: BuilderOptions,
    snapshot: ProgramSnapshot,
    state: BuilderState,
    cache: DiagnosticsCache,
    /// Changed units whose affected pass has not started yet.
    roots: VecDeque<PendingRoot>,
    current: Option<AffectedPass>,
    /// Units rechecked against the current program.
    processed: HashSet<UnitId>,
    /// Units whose text changed in this round.
    changed_this_round: HashSet<UnitId>,
    pending_emit: PendingEmitQueue,
    /// Emits that failed; requeued when the next round starts.
    deferred_emits: Vec<PendingEmit>,
    /// Treat every unit as changed in the next round.
    force_all: bool,
    phase: BuilderPhase,
    cancel: CancellationToken,
}

impl<H: CompilerHost> BuilderProgram<H> {
    /// Create a builder with no prior state: every unit is affected.
    pub fn new(mut host: H, options: BuilderOptions) -> Result<Self> {
        let snapshot = host.snapshot(&[])?;
        let mut program = Self::empty(host, options);
        program.update_from(snapshot);
        Ok(program)
    }

    /// Create a builder seeded from a persisted build info document.
    ///
    /// A missing, unreadable or incompatible document is not an error: the
    /// builder starts fresh and every unit is affected.
    pub fn from_build_info(host: H, options: BuilderOptions, document: Option<&str>) -> Result<Self> {
        let Some(document) = document else {
            debug!("no build info document; starting fresh");
            return Self::new(host, options);
        };

        let decoded = match BuildInfoCodec::new().deserialize_str(document) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "discarding build info document; starting fresh");
                return Self::new(host, options);
            }
        };

        let mut host = host;
        let snapshot = host.snapshot(&[])?;
        let mut program = Self::empty(host, options);
        program.restore(decoded);
        program.update_from(snapshot);
        Ok(program)
    }

    fn empty(host: H, options: BuilderOptions) -> Self {
        Self {
            host,
            options,
            snapshot: ProgramSnapshot::default(),
            state: BuilderState::empty(),
            cache: DiagnosticsCache::new(),
            roots: VecDeque::new(),
            current: None,
            processed: HashSet::new(),
            changed_this_round: HashSet::new(),
            pending_emit: PendingEmitQueue::new(),
            deferred_emits: Vec::new(),
            force_all: false,
            phase: BuilderPhase::Created,
            cancel: CancellationToken::new(),
        }
    }

    fn restore(&mut self, decoded: DecodedBuildInfo) {
        let current_hash = self.options_hash();
        if decoded.options_hash.as_deref() != Some(current_hash.as_str()) {
            info!("options changed since the build info was written; rechecking everything");
            self.force_all = true;
        }
        if decoded.state.graph().is_tracking() != self.options.dependency_tracking {
            self.force_all = true;
        }

        for (unit, diagnostics) in decoded.diagnostics {
            if let Some(info) = decoded.state.info_by_path(&unit) {
                self.cache.commit(&unit, &info.version, diagnostics);
            }
        }

        self.roots = decoded
            .pending_check
            .iter()
            .filter_map(|check| {
                let unit = decoded.state.graph().unit_id(&check.unit)?;
                Some(PendingRoot {
                    unit,
                    global: check.global,
                })
            })
            .collect();

        info!(
            units = decoded.state.len(),
            cached = self.cache.len(),
            pending_check = self.roots.len(),
            pending_emit = decoded.pending_emit.remaining().len(),
            "restored builder state from build info"
        );

        self.state = decoded.state;
        self.pending_emit = decoded.pending_emit;
    }

    /// Re-derive state from a new program, carrying forward what is still
    /// valid and resuming whatever the previous round left unfinished.
    pub fn update_from(&mut self, snapshot: ProgramSnapshot) {
        let leftover = self.pending_checks();

        let (state, delta) = BuilderState::from_snapshot(
            &snapshot,
            self.options.dependency_tracking,
            Some(&self.state),
        );
        self.state = state;
        self.snapshot = snapshot;
        self.current = None;
        self.roots.clear();
        self.processed.clear();
        self.changed_this_round = delta.changed.iter().copied().collect();

        let reused = self.cache.retain_current(&self.state);

        let force_all = std::mem::take(&mut self.force_all);
        let graph = self.state.graph();
        let carried: Vec<PendingRoot> = leftover
            .iter()
            .filter_map(|check| {
                Some(PendingRoot {
                    unit: graph.unit_id(&check.unit)?,
                    global: check.global,
                })
            })
            .collect();

        let roots = if force_all || delta.removed_global {
            if delta.removed_global {
                info!("a removed unit affected the global scope; rechecking everything");
            }
            let everything = graph.units().map(|unit| PendingRoot {
                unit,
                global: delta.global_roots.contains(&unit),
            });
            merge_roots(everything.chain(carried))
        } else {
            let changed = delta.changed.iter().map(|&unit| PendingRoot {
                unit,
                global: delta.global_roots.contains(&unit),
            });
            let orphaned = delta
                .dependents_of_removed
                .iter()
                .map(|&unit| PendingRoot { unit, global: false });
            merge_roots(changed.chain(orphaned).chain(carried))
        };

        for root in &roots {
            self.cache.invalidate(self.state.path_of(root.unit));
        }
        self.roots = roots.into();

        let state = &self.state;
        self.pending_emit.compact(|unit| state.graph().contains(unit));
        for entry in std::mem::take(&mut self.deferred_emits) {
            if self.state.graph().contains(&entry.unit) {
                self.pending_emit.push(&entry.unit, entry.kind);
            }
        }
        let full_emits: Vec<UnitId> = if force_all {
            self.state.graph().units().collect()
        } else {
            delta.changed.clone()
        };
        for unit in full_emits {
            let path = self.state.path_of(unit).to_string();
            self.pending_emit.push(&path, EmitKind::Full);
        }

        self.phase = BuilderPhase::Created;
        info!(
            units = self.state.len(),
            roots = self.roots.len(),
            reused_diagnostics = reused,
            removed = delta.removed.len(),
            force_all,
            pending_emit = self.pending_emit.remaining().len(),
            "builder program updated"
        );
    }

    /// Take a fresh snapshot from the host after `paths` were reported as
    /// changed, and update from it.
    ///
    /// A report received while a previous one is still being consumed
    /// supersedes it; the unconsumed work is carried into the new round.
    pub fn report_changed<I, S>(&mut self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let changed: Vec<UnitPath> = paths
            .into_iter()
            .map(|p| normalize_unit_path(p.as_ref()))
            .collect();
        let snapshot = self.host.snapshot(&changed)?;

        for path in &changed {
            let previous = self.state.info_by_path(path);
            let current = snapshot
                .unit(path)
                .map(|u| UnitInfo::unchecked(u.version.clone(), u.affects_global_scope));
            match current {
                Some(current) if !needs_pass(previous, &current, false) => {
                    debug!(unit = %path, "reported change left the unit text unchanged");
                }
                Some(_) => debug!(unit = %path, "reported change"),
                None => debug!(unit = %path, "reported unit is not part of the program"),
            }
        }

        self.update_from(snapshot);
        Ok(())
    }

    /// Switch options. A change that affects checking or emit results
    /// rechecks and re-emits every unit.
    pub fn set_options(&mut self, options: BuilderOptions) {
        let before = self.options_hash();
        self.options = options;
        if self.options_hash() != before {
            info!("builder options changed; rechecking everything");
            self.force_all = true;
            let snapshot = self.snapshot.clone();
            self.update_from(snapshot);
        }
    }

    /// Recheck and fully re-emit every unit of the current program.
    pub fn force_full_rebuild(&mut self) {
        self.force_all = true;
        let snapshot = self.snapshot.clone();
        self.update_from(snapshot);
    }

    /// Recheck the next affected unit and return its diagnostics, or `None`
    /// once every affected unit of this round has been rechecked.
    pub fn get_next_affected_file_diagnostics(&mut self) -> Result<Option<AffectedDiagnostics>> {
        if self.phase == BuilderPhase::Done {
            return Ok(None);
        }
        self.cancel.check()?;

        match self.next_unit() {
            Some(unit) => {
                self.phase = BuilderPhase::IteratingAffectedFiles;
                let unit_path = self.state.path_of(unit).to_string();
                let diagnostics = self.process(unit);
                Ok(Some(AffectedDiagnostics {
                    unit: unit_path,
                    diagnostics,
                }))
            }
            None => {
                self.finish_checking();
                Ok(None)
            }
        }
    }

    /// Emit the next pending unit, rechecking affected units first where
    /// needed to learn what has to be emitted. `None` once nothing is left.
    pub fn emit_next_affected_file(&mut self) -> Result<Option<AffectedEmit>> {
        loop {
            if self.phase == BuilderPhase::Done {
                return Ok(None);
            }
            self.cancel.check()?;

            if let Some(entry) = self.pending_emit.next_pending() {
                self.phase = BuilderPhase::EmitPending;
                return Ok(Some(self.emit(entry)));
            }

            match self.next_unit() {
                Some(unit) => {
                    self.phase = BuilderPhase::IteratingAffectedFiles;
                    self.process(unit);
                }
                None => {
                    self.phase = BuilderPhase::Done;
                    debug!("all affected units checked and emitted");
                    return Ok(None);
                }
            }
        }
    }

    /// Drain every affected unit of this round.
    pub fn check_all_affected(&mut self) -> Result<Vec<AffectedDiagnostics>> {
        let mut out = Vec::new();
        while let Some(next) = self.get_next_affected_file_diagnostics()? {
            out.push(next);
        }
        Ok(out)
    }

    /// Drain every pending emit of this round.
    pub fn emit_all_affected(&mut self) -> Result<Vec<AffectedEmit>> {
        let mut out = Vec::new();
        while let Some(next) = self.emit_next_affected_file()? {
            out.push(next);
        }
        Ok(out)
    }

    /// `unit` followed by its transitive dependencies in breadth-first order.
    pub fn get_all_dependencies_of(&self, unit: &str) -> Result<Vec<UnitPath>> {
        let path = normalize_unit_path(unit);
        let graph = self.state.graph();
        let id = graph
            .unit_id(&path)
            .ok_or_else(|| IncbuildError::UnknownUnit(path.clone()))?;
        Ok(graph
            .all_dependencies_of(id)
            .into_iter()
            .map(|dep| graph.path_of(dep).to_string())
            .collect())
    }

    /// Diagnostics of `unit`, served from the cache when current and checked
    /// on demand otherwise.
    pub fn semantic_diagnostics(&mut self, unit: &str) -> Result<Arc<[Diagnostic]>> {
        let path = normalize_unit_path(unit);
        if let Some(cached) = self.cache.get(&path) {
            return Ok(cached);
        }
        let version = self
            .state
            .info_by_path(&path)
            .map(|info| info.version.clone())
            .ok_or_else(|| IncbuildError::UnknownUnit(path.clone()))?;

        debug!(unit = %path, "checking unit on demand");
        let diagnostics = match self.host.check_unit(&path) {
            Ok(d) => d,
            Err(e) => {
                warn!(unit = %path, error = %e, "checker failed");
                vec![Diagnostic::host_failure(&path, "check", &e)]
            }
        };
        Ok(self.cache.commit(&path, &version, diagnostics))
    }

    /// Diagnostics of every unit in program order.
    pub fn all_diagnostics(&mut self) -> Result<Vec<Diagnostic>> {
        let paths: Vec<UnitPath> = self.state.graph().paths().to_vec();
        let mut out = Vec::new();
        for path in paths {
            out.extend(self.semantic_diagnostics(&path)?.iter().cloned());
        }
        Ok(out)
    }

    pub fn cached_diagnostics(&self, unit: &str) -> Option<Arc<[Diagnostic]>> {
        self.cache.get(&normalize_unit_path(unit))
    }

    /// Units still owed a recheck in this round, in the order they would be
    /// processed.
    pub fn pending_checks(&self) -> Vec<PendingCheck> {
        let in_pass = self.current.iter().flat_map(|pass| {
            pass.remaining().into_iter().map(|unit| PendingRoot {
                unit,
                global: pass.marks_everything(unit),
            })
        });
        let queued = self.roots.iter().copied();
        merge_roots(in_pass.chain(queued))
            .into_iter()
            .filter(|root| !self.processed.contains(&root.unit))
            .map(|root| PendingCheck::new(self.state.path_of(root.unit), root.global))
            .collect()
    }

    pub fn pending_check_paths(&self) -> Vec<UnitPath> {
        self.pending_checks()
            .into_iter()
            .map(|check| check.unit)
            .collect()
    }

    /// Persistable snapshot of the builder.
    pub fn build_info(&self) -> BuildInfo {
        let options_hash = self.options_hash();
        let pending_check = self.pending_checks();
        let mut pending_emit = self.pending_emit.clone();
        for entry in &self.deferred_emits {
            pending_emit.push(&entry.unit, entry.kind);
        }
        BuildInfoCodec::new().serialize(BuildInfoInput {
            state: &self.state,
            pending_emit: &pending_emit,
            pending_check: &pending_check,
            diagnostics: self.options.persist_diagnostics.then_some(&self.cache),
            options_hash: Some(&options_hash),
        })
    }

    pub fn build_info_json(&self) -> Result<String> {
        BuildInfoCodec::to_json(&self.build_info())
    }

    pub fn state(&self) -> &BuilderState {
        &self.state
    }

    pub fn snapshot(&self) -> &ProgramSnapshot {
        &self.snapshot
    }

    pub fn options(&self) -> BuilderOptions {
        self.options
    }

    pub fn phase(&self) -> BuilderPhase {
        self.phase
    }

    pub fn pending_emit(&self) -> &PendingEmitQueue {
        &self.pending_emit
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn options_hash(&self) -> String {
        self.options.fingerprint(&self.host.policy_key())
    }

    fn finish_checking(&mut self) {
        if matches!(
            self.phase,
            BuilderPhase::Created | BuilderPhase::IteratingAffectedFiles
        ) {
            self.phase = if self.pending_emit.is_empty() {
                BuilderPhase::Done
            } else {
                BuilderPhase::FullyChecked
            };
            debug!(
                phase = ?self.phase,
                resigned = self.state.signature_updates(),
                "affected units exhausted"
            );
        }
    }

    fn next_unit(&mut self) -> Option<UnitId> {
        loop {
            if let Some(pass) = self.current.as_mut() {
                if let Some(unit) = pass.next_affected(&self.processed) {
                    return Some(unit);
                }
                debug!(
                    root = %self.state.path_of(pass.root()),
                    yielded = pass.yielded().len(),
                    "affected pass exhausted"
                );
                self.current = None;
            }

            let root = self.roots.pop_front()?;
            if self.processed.contains(&root.unit) {
                continue;
            }
            debug!(
                root = %self.state.path_of(root.unit),
                global = root.global,
                "starting affected pass"
            );
            self.current = Some(AffectedPass::start(root.unit, root.global));
        }
    }

    /// Recheck `unit`, store its diagnostics and signature, queue its emit
    /// and let the current pass propagate.
    fn process(&mut self, unit: UnitId) -> Arc<[Diagnostic]> {
        let path = self.state.path_of(unit).to_string();

        let (mut diagnostics, checked) = match self.host.check_unit(&path) {
            Ok(d) => (d, true),
            Err(e) => {
                warn!(unit = %path, error = %e, "checker failed");
                (vec![Diagnostic::host_failure(&path, "check", &e)], false)
            }
        };

        let signature = if checked {
            match self.host.public_interface_of(&path) {
                Ok(interface) => {
                    let host = &self.host;
                    Signature::Signatured(compute_signature(&interface, |decl| {
                        host.counts_toward_signature(decl)
                    }))
                }
                Err(e) => {
                    warn!(unit = %path, error = %e, "failed to read public interface");
                    diagnostics.push(Diagnostic::host_failure(&path, "interface", &e));
                    Signature::Unsignatured
                }
            }
        } else {
            Signature::Unsignatured
        };

        let signature_changed = self.state.update_signature(unit, signature);
        let info = self.state.info(unit).clone();
        let committed = self.cache.commit(&path, &info.version, diagnostics);
        self.processed.insert(unit);

        if signature_changed
            && self.options.emit_declarations
            && !self.changed_this_round.contains(&unit)
        {
            self.pending_emit.push(&path, EmitKind::TypesOnly);
        }

        let Self {
            current,
            state,
            cache,
            processed,
            ..
        } = self;
        if let Some(pass) = current.as_mut() {
            pass.complete(
                state.graph(),
                &info,
                unit,
                signature_changed,
                processed,
                |dependent| cache.invalidate(state.path_of(dependent)),
            );
        }

        debug!(
            unit = %path,
            diagnostics = committed.len(),
            signature_changed,
            "unit rechecked"
        );
        committed
    }

    fn emit(&mut self, entry: PendingEmit) -> AffectedEmit {
        debug!(unit = %entry.unit, kind = ?entry.kind, "emitting unit");
        let output = match self.host.emit_unit(&entry.unit, entry.kind) {
            Ok(output) => output,
            Err(e) => {
                warn!(unit = %entry.unit, error = %e, "emitter failed; emit deferred to next round");
                self.deferred_emits.push(entry.clone());
                EmitOutput {
                    written_files: Vec::new(),
                    diagnostics: vec![Diagnostic::host_failure(&entry.unit, "emit", &e)],
                }
            }
        };
        AffectedEmit {
            unit: entry.unit,
            kind: entry.kind,
            written_files: output.written_files,
            diagnostics: output.diagnostics,
        }
    }
}
