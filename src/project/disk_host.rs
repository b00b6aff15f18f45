// src/project/disk_host.rs

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::diagnostics::{Diagnostic, DiagnosticCategory};
use crate::errors::{IncbuildError, Result};
use crate::fs::FileSystem;
use crate::graph::DependencyRef;
use crate::program::{CompilerHost, EmitOutput, ProgramSnapshot, SourceUnit};
use crate::project::patterns::{UnitMatcher, collect_matching_units};
use crate::project::source::{ExportLine, ParsedUnit, UnitParser};
use crate::signature::{ExportedDeclaration, PublicInterface, compute_file_version, compute_version};
use crate::types::{EmitKind, UnitPath};

pub const CODE_ERROR_DIRECTIVE: u32 = 1001;
pub const CODE_WARN_DIRECTIVE: u32 = 1002;
pub const CODE_DUPLICATE_EXPORT: u32 = 2300;
pub const CODE_NOT_IMPORTED: u32 = 2304;
pub const CODE_NO_EXPORTED_MEMBER: u32 = 2305;
pub const CODE_UNRESOLVED_IMPORT: u32 = 2307;

/// Shape given to an inferred export whose source cannot be resolved.
const UNRESOLVED_SHAPE: &str = "unknown";

#[derive(Debug, Clone)]
struct HostUnit {
    text: String,
    parsed: ParsedUnit,
    /// Why the file could not be read. Checking, interface queries and emits
    /// of such a unit fail with this message.
    unreadable: Option<String>,
}

/// Compiler host for `.unit` files on a [`FileSystem`].
///
/// Every snapshot rescans the project root; parses are reused for files whose
/// text is unchanged.
#[derive(Debug)]
pub struct DiskCompilerHost {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    matcher: UnitMatcher,
    out_dir: PathBuf,
    include_inferred_types: bool,
    parser: UnitParser,
    units: BTreeMap<UnitPath, HostUnit>,
}

impl DiskCompilerHost {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        matcher: UnitMatcher,
        out_dir: impl Into<PathBuf>,
        include_inferred_types: bool,
    ) -> Result<Self> {
        Ok(Self {
            fs,
            root: root.into(),
            matcher,
            out_dir: out_dir.into(),
            include_inferred_types,
            parser: UnitParser::new()?,
            units: BTreeMap::new(),
        })
    }

    pub fn from_config(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, cfg: &ConfigFile) -> Result<Self> {
        let matcher = UnitMatcher::from_config(&cfg.units)?;
        Self::new(
            fs,
            root,
            matcher,
            cfg.config.out_dir.clone(),
            cfg.config.include_inferred_types,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn matcher(&self) -> &UnitMatcher {
        &self.matcher
    }

    /// Path of the output written for `unit` by an emit of `kind`.
    pub fn output_path(&self, unit: &str, kind: EmitKind) -> PathBuf {
        let ext = match kind {
            EmitKind::Full => "js",
            EmitKind::TypesOnly => "d",
        };
        self.root.join(&self.out_dir).join(format!("{unit}.{ext}"))
    }

    fn unit(&self, unit: &str) -> Result<&HostUnit> {
        let host_unit = self
            .units
            .get(unit)
            .ok_or_else(|| IncbuildError::UnknownUnit(unit.to_string()))?;
        match &host_unit.unreadable {
            Some(reason) => Err(anyhow::anyhow!("unit {unit} is unreadable: {reason}").into()),
            None => Ok(host_unit),
        }
    }

    /// Version of a file that could not be read as text. Hashes the raw bytes
    /// when they can be read, so the unit is rechecked once the file changes.
    fn unreadable_version(&self, file: &Path, reason: &str) -> String {
        compute_file_version(self.fs.as_ref(), file)
            .unwrap_or_else(|_| compute_version(&format!("unreadable: {reason}")))
    }

    /// Full interface of `unit`, following re-exports and inferred exports.
    /// `visiting` breaks cycles.
    fn resolve_interface(&self, unit: &str, visiting: &mut HashSet<UnitPath>) -> Vec<ExportedDeclaration> {
        let Some(host_unit) = self.units.get(unit) else {
            return Vec::new();
        };
        if !visiting.insert(unit.to_string()) {
            return Vec::new();
        }

        let mut declarations = Vec::new();
        for export in &host_unit.parsed.exports {
            match export {
                ExportLine::Declared {
                    kind, name, shape, ..
                } => declarations.push(ExportedDeclaration::new(kind, name, shape)),
                ExportLine::Inferred {
                    name, from, member, ..
                } => {
                    let shape = self
                        .resolve_interface(from, visiting)
                        .into_iter()
                        .find(|d| &d.name == member)
                        .map(|d| d.shape)
                        .unwrap_or_else(|| UNRESOLVED_SHAPE.to_string());
                    declarations.push(ExportedDeclaration::new("let", name, shape).inferred());
                }
            }
        }
        for import in host_unit.parsed.imports.iter().filter(|i| i.reexport) {
            declarations.extend(self.resolve_interface(&import.path, visiting));
        }

        visiting.remove(unit);
        declarations
    }

    fn exports_member(&self, unit: &str, member: &str) -> bool {
        self.resolve_interface(unit, &mut HashSet::new())
            .iter()
            .any(|d| d.name == member)
    }
}

impl CompilerHost for DiskCompilerHost {
    fn snapshot(&mut self, changed: &[UnitPath]) -> Result<ProgramSnapshot> {
        let paths = collect_matching_units(self.fs.as_ref(), &self.root, &self.matcher)?;

        let mut previous = std::mem::take(&mut self.units);
        let mut reparsed = 0usize;
        let mut units = Vec::with_capacity(paths.len());

        let mut unreadable = 0usize;
        for path in paths {
            let file = self.root.join(&path);
            let (host_unit, version) = match self.fs.read_to_string(&file) {
                Ok(text) => {
                    let host_unit = match previous.remove(&path) {
                        Some(old) if old.unreadable.is_none() && old.text == text => old,
                        _ => {
                            reparsed += 1;
                            let parsed = self.parser.parse(&text);
                            HostUnit {
                                text,
                                parsed,
                                unreadable: None,
                            }
                        }
                    };
                    let version = compute_version(&host_unit.text);
                    (host_unit, version)
                }
                Err(e) => {
                    warn!(unit = %path, error = %e, "cannot read unit; keeping it without contents");
                    unreadable += 1;
                    previous.remove(&path);
                    let reason = e.to_string();
                    let version = self.unreadable_version(&file, &reason);
                    let host_unit = HostUnit {
                        text: String::new(),
                        parsed: ParsedUnit::default(),
                        unreadable: Some(reason),
                    };
                    (host_unit, version)
                }
            };

            let mut source = SourceUnit::from_text(&path, &host_unit.text)
                .with_global_scope(host_unit.parsed.declares_global);
            source.version = version;
            for import in &host_unit.parsed.imports {
                let dep = if import.reexport {
                    DependencyRef::reexport(import.path.clone())
                } else {
                    DependencyRef::import(import.path.clone())
                };
                source = source.with_dependency(dep);
            }
            for export in &host_unit.parsed.exports {
                if let ExportLine::Inferred { from, .. } = export {
                    source = source.with_dependency(DependencyRef::import(from.clone()));
                }
            }

            units.push(source);
            self.units.insert(path, host_unit);
        }

        info!(
            units = units.len(),
            reparsed,
            unreadable,
            reported = changed.len(),
            "scanned project units"
        );
        Ok(ProgramSnapshot::new(units))
    }

    fn check_unit(&mut self, unit: &str) -> Result<Vec<Diagnostic>> {
        let parsed = &self.unit(unit)?.parsed;
        let mut diagnostics = Vec::new();

        for import in &parsed.imports {
            if !self.units.contains_key(&import.path) {
                diagnostics.push(
                    Diagnostic::error(
                        unit,
                        CODE_UNRESOLVED_IMPORT,
                        format!("cannot find unit '{}'", import.path),
                    )
                    .at_line(import.line),
                );
            }
        }

        let mut names: HashSet<&str> = HashSet::new();
        for export in &parsed.exports {
            if !names.insert(export.name()) {
                diagnostics.push(
                    Diagnostic::error(
                        unit,
                        CODE_DUPLICATE_EXPORT,
                        format!("duplicate export '{}'", export.name()),
                    )
                    .at_line(export.line()),
                );
            }
            if let ExportLine::Inferred {
                from, member, line, ..
            } = export
            {
                if !self.units.contains_key(from) {
                    diagnostics.push(
                        Diagnostic::error(unit, CODE_UNRESOLVED_IMPORT, format!("cannot find unit '{from}'"))
                            .at_line(*line),
                    );
                } else if !self.exports_member(from, member) {
                    diagnostics.push(
                        Diagnostic::error(
                            unit,
                            CODE_NO_EXPORTED_MEMBER,
                            format!("unit '{from}' has no exported member '{member}'"),
                        )
                        .at_line(*line),
                    );
                }
            }
        }

        for site in &parsed.uses {
            if !parsed.references(&site.from) {
                diagnostics.push(
                    Diagnostic::error(
                        unit,
                        CODE_NOT_IMPORTED,
                        format!("'{}' is used but not imported", site.from),
                    )
                    .at_line(site.line),
                );
            } else if self.units.contains_key(&site.from) && !self.exports_member(&site.from, &site.member) {
                diagnostics.push(
                    Diagnostic::error(
                        unit,
                        CODE_NO_EXPORTED_MEMBER,
                        format!("unit '{}' has no exported member '{}'", site.from, site.member),
                    )
                    .at_line(site.line),
                );
            }
        }

        for directive in &parsed.directives {
            let diagnostic = match directive.category {
                DiagnosticCategory::Error => {
                    Diagnostic::error(unit, CODE_ERROR_DIRECTIVE, directive.message.clone())
                }
                _ => Diagnostic::warning(unit, CODE_WARN_DIRECTIVE, directive.message.clone()),
            };
            diagnostics.push(diagnostic.at_line(directive.line));
        }

        debug!(unit = %unit, diagnostics = diagnostics.len(), "checked unit");
        Ok(diagnostics)
    }

    fn public_interface_of(&mut self, unit: &str) -> Result<PublicInterface> {
        self.unit(unit)?;
        Ok(PublicInterface::new(
            self.resolve_interface(unit, &mut HashSet::new()),
        ))
    }

    fn emit_unit(&mut self, unit: &str, kind: EmitKind) -> Result<EmitOutput> {
        let host_unit = self.unit(unit)?;

        let declarations: String = self
            .resolve_interface(unit, &mut HashSet::new())
            .iter()
            .map(|d| format!("export {} {} {}\n", d.kind, d.name, d.shape))
            .collect();

        let mut outputs: Vec<(PathBuf, String)> = Vec::new();
        if kind == EmitKind::Full {
            let body: String = host_unit
                .text
                .lines()
                .filter(|line| !line.trim_start().starts_with('!'))
                .map(|line| format!("{line}\n"))
                .collect();
            outputs.push((
                self.output_path(unit, EmitKind::Full),
                format!("// generated from {unit}\n{body}"),
            ));
        }
        outputs.push((self.output_path(unit, EmitKind::TypesOnly), declarations));

        let mut written_files = Vec::with_capacity(outputs.len());
        for (path, contents) in outputs {
            self.fs
                .write(&path, contents.as_bytes())
                .with_context(|| format!("emitting {unit}"))?;
            written_files.push(path);
        }

        debug!(unit = %unit, ?kind, files = written_files.len(), "emitted unit");
        Ok(EmitOutput {
            written_files,
            diagnostics: Vec::new(),
        })
    }

    fn counts_toward_signature(&self, decl: &ExportedDeclaration) -> bool {
        self.include_inferred_types || !decl.inferred
    }

    fn policy_key(&self) -> String {
        format!("include_inferred_types={}", self.include_inferred_types)
    }
}
