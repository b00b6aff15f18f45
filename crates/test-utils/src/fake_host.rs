#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use incbuild::diagnostics::Diagnostic;
use incbuild::errors::{IncbuildError, Result};
use incbuild::graph::DependencyRef;
use incbuild::program::{CancellationToken, CompilerHost, EmitOutput, ProgramSnapshot, SourceUnit};
use incbuild::signature::{ExportedDeclaration, PublicInterface, compute_version};
use incbuild::types::{EmitKind, UnitPath};

pub const FAKE_ERROR_CODE: u32 = 9000;
pub const FAKE_UNRESOLVED_CODE: u32 = 2307;

/// One unit of a [`FakeCompilerHost`] program.
///
/// The unit's version is derived from all of its fields, so any edit counts
/// as a text change. Edits to `body` alone leave the public shape untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeUnit {
    pub body: String,
    pub imports: Vec<String>,
    pub reexports: Vec<String>,
    pub exports: Vec<(String, String)>,
    pub inferred: Vec<(String, String)>,
    pub global: bool,
    pub errors: Vec<String>,
    pub fail_check: bool,
    pub fail_interface: bool,
    pub fail_emit: bool,
}

impl FakeUnit {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            ..Self::default()
        }
    }

    pub fn import(mut self, path: &str) -> Self {
        self.imports.push(path.to_string());
        self
    }

    pub fn reexport(mut self, path: &str) -> Self {
        self.reexports.push(path.to_string());
        self
    }

    pub fn export(mut self, name: &str, shape: &str) -> Self {
        self.exports.push((name.to_string(), shape.to_string()));
        self
    }

    pub fn inferred(mut self, name: &str, shape: &str) -> Self {
        self.inferred.push((name.to_string(), shape.to_string()));
        self
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn error(mut self, message: &str) -> Self {
        self.errors.push(message.to_string());
        self
    }

    pub fn failing_check(mut self) -> Self {
        self.fail_check = true;
        self
    }

    pub fn failing_interface(mut self) -> Self {
        self.fail_interface = true;
        self
    }

    pub fn failing_emit(mut self) -> Self {
        self.fail_emit = true;
        self
    }

    fn version(&self) -> String {
        compute_version(&format!("{self:?}"))
    }
}

/// In-memory [`CompilerHost`] that records every check and emit.
#[derive(Debug, Clone)]
pub struct FakeCompilerHost {
    units: BTreeMap<UnitPath, FakeUnit>,
    include_inferred: bool,
    checks: Vec<UnitPath>,
    emits: Vec<(UnitPath, EmitKind)>,
    snapshots: usize,
    failing_snapshots: usize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl Default for FakeCompilerHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCompilerHost {
    pub fn new() -> Self {
        Self {
            units: BTreeMap::new(),
            include_inferred: true,
            checks: Vec::new(),
            emits: Vec::new(),
            snapshots: 0,
            failing_snapshots: 0,
            cancel_after: None,
        }
    }

    pub fn with_unit(mut self, path: &str, unit: FakeUnit) -> Self {
        self.set_unit(path, unit);
        self
    }

    pub fn with_inferred_types(mut self, include: bool) -> Self {
        self.include_inferred = include;
        self
    }

    pub fn set_inferred_types(&mut self, include: bool) {
        self.include_inferred = include;
    }

    pub fn set_unit(&mut self, path: &str, unit: FakeUnit) {
        self.units.insert(path.to_string(), unit);
    }

    pub fn remove_unit(&mut self, path: &str) -> Option<FakeUnit> {
        self.units.remove(path)
    }

    /// Apply `f` to a unit in place.
    pub fn edit<F>(&mut self, path: &str, f: F)
    where
        F: FnOnce(&mut FakeUnit),
    {
        if let Some(unit) = self.units.get_mut(path) {
            f(unit);
        }
    }

    /// Change only the implementation of a unit.
    pub fn edit_body(&mut self, path: &str, body: &str) {
        self.edit(path, |u| u.body = body.to_string());
    }

    /// Change the shape of an exported declaration, adding it if missing.
    pub fn edit_export(&mut self, path: &str, name: &str, shape: &str) {
        self.edit(path, |u| match u.exports.iter_mut().find(|(n, _)| n == name) {
            Some(export) => export.1 = shape.to_string(),
            None => u.exports.push((name.to_string(), shape.to_string())),
        });
    }

    /// Cancel `token` once `checks` more units have been checked. Fires once.
    pub fn cancel_after_checks(&mut self, checks: usize, token: CancellationToken) {
        self.cancel_after = Some((self.checks.len() + checks, token));
    }

    /// Make the next `count` snapshots fail.
    pub fn fail_next_snapshots(&mut self, count: usize) {
        self.failing_snapshots = count;
    }

    pub fn checks(&self) -> &[UnitPath] {
        &self.checks
    }

    pub fn emits(&self) -> &[(UnitPath, EmitKind)] {
        &self.emits
    }

    pub fn snapshots(&self) -> usize {
        self.snapshots
    }

    pub fn clear_logs(&mut self) {
        self.checks.clear();
        self.emits.clear();
    }

    fn get(&self, path: &str) -> Result<&FakeUnit> {
        self.units
            .get(path)
            .ok_or_else(|| IncbuildError::UnknownUnit(path.to_string()))
    }

    fn declarations_of(&self, path: &str, visiting: &mut HashSet<String>) -> Vec<ExportedDeclaration> {
        let Some(unit) = self.units.get(path) else {
            return Vec::new();
        };
        if !visiting.insert(path.to_string()) {
            return Vec::new();
        }
        let mut out: Vec<ExportedDeclaration> = unit
            .exports
            .iter()
            .map(|(name, shape)| ExportedDeclaration::new("type", name, shape))
            .chain(
                unit.inferred
                    .iter()
                    .map(|(name, shape)| ExportedDeclaration::new("let", name, shape).inferred()),
            )
            .collect();
        for target in &unit.reexports {
            out.extend(self.declarations_of(target, visiting));
        }
        out
    }
}

impl CompilerHost for FakeCompilerHost {
    fn snapshot(&mut self, _changed: &[UnitPath]) -> Result<ProgramSnapshot> {
        self.snapshots += 1;
        if self.failing_snapshots > 0 {
            self.failing_snapshots -= 1;
            return Err(anyhow::anyhow!("project scan failed").into());
        }
        let units = self
            .units
            .iter()
            .map(|(path, unit)| {
                let mut source = SourceUnit {
                    path: path.clone(),
                    version: unit.version(),
                    dependencies: Vec::new(),
                    affects_global_scope: unit.global,
                };
                for import in &unit.imports {
                    source = source.with_dependency(DependencyRef::import(import.clone()));
                }
                for reexport in &unit.reexports {
                    source = source.with_dependency(DependencyRef::reexport(reexport.clone()));
                }
                source
            })
            .collect();
        Ok(ProgramSnapshot::new(units))
    }

    fn check_unit(&mut self, unit: &str) -> Result<Vec<Diagnostic>> {
        self.checks.push(unit.to_string());
        if self
            .cancel_after
            .as_ref()
            .is_some_and(|(limit, _)| self.checks.len() >= *limit)
        {
            if let Some((_, token)) = self.cancel_after.take() {
                token.cancel();
            }
        }

        let fake = self.get(unit)?;
        if fake.fail_check {
            return Err(anyhow::anyhow!("checker crashed on {unit}").into());
        }

        let mut diagnostics: Vec<Diagnostic> = fake
            .errors
            .iter()
            .map(|msg| Diagnostic::error(unit, FAKE_ERROR_CODE, msg.clone()))
            .collect();
        for import in fake.imports.iter().chain(fake.reexports.iter()) {
            if !self.units.contains_key(import) {
                diagnostics.push(Diagnostic::error(
                    unit,
                    FAKE_UNRESOLVED_CODE,
                    format!("cannot find unit '{import}'"),
                ));
            }
        }
        Ok(diagnostics)
    }

    fn public_interface_of(&mut self, unit: &str) -> Result<PublicInterface> {
        if self.get(unit)?.fail_interface {
            return Err(anyhow::anyhow!("no interface for {unit}").into());
        }
        Ok(PublicInterface::new(
            self.declarations_of(unit, &mut HashSet::new()),
        ))
    }

    fn emit_unit(&mut self, unit: &str, kind: EmitKind) -> Result<EmitOutput> {
        self.emits.push((unit.to_string(), kind));
        if self.get(unit)?.fail_emit {
            return Err(anyhow::anyhow!("emitter crashed on {unit}").into());
        }
        let mut written_files = vec![PathBuf::from(format!("out/{unit}.d"))];
        if kind == EmitKind::Full {
            written_files.insert(0, PathBuf::from(format!("out/{unit}.js")));
        }
        Ok(EmitOutput {
            written_files,
            diagnostics: Vec::new(),
        })
    }

    fn counts_toward_signature(&self, decl: &ExportedDeclaration) -> bool {
        self.include_inferred || !decl.inferred
    }

    fn policy_key(&self) -> String {
        format!("include_inferred={}", self.include_inferred)
    }
}
