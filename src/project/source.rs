// src/project/source.rs

//! Parser for the line-oriented `.unit` language understood by
//! [`super::DiskCompilerHost`].
//!
//! ```text
//! import "src/util.unit"
//! export * from "src/types.unit"
//! export fn parse (text: str) -> Ast
//! export let default_ast = "src/util.unit".empty
//! declare global Logger
//! let x = use "src/util.unit".trim
//! !warn deprecated entry point
//! ```
//!
//! Any other line is implementation text: it changes the unit's version but
//! not its public shape.

use anyhow::Context;
use regex::Regex;

use crate::diagnostics::DiagnosticCategory;
use crate::errors::Result;
use crate::types::{UnitPath, normalize_unit_path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLine {
    pub path: UnitPath,
    pub reexport: bool,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportLine {
    /// `export <kind> <name> <shape...>`
    Declared {
        kind: String,
        name: String,
        shape: String,
        line: u32,
    },
    /// `export let <name> = "<unit>".<member>`: the shape is whatever the
    /// referenced export's shape is.
    Inferred {
        name: String,
        from: UnitPath,
        member: String,
        line: u32,
    },
}

impl ExportLine {
    pub fn name(&self) -> &str {
        match self {
            ExportLine::Declared { name, .. } | ExportLine::Inferred { name, .. } => name,
        }
    }

    pub fn line(&self) -> u32 {
        match self {
            ExportLine::Declared { line, .. } | ExportLine::Inferred { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseSite {
    pub from: UnitPath,
    pub member: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub category: DiagnosticCategory,
    pub message: String,
    pub line: u32,
}

/// Everything the host needs to know about one unit's text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUnit {
    pub imports: Vec<ImportLine>,
    pub exports: Vec<ExportLine>,
    pub declares_global: bool,
    pub uses: Vec<UseSite>,
    pub directives: Vec<Directive>,
}

impl ParsedUnit {
    /// Whether `path` is reachable by name from this unit: imported,
    /// re-exported, or referenced by an inferred export.
    pub fn references(&self, path: &str) -> bool {
        self.imports.iter().any(|i| i.path == path)
            || self.exports.iter().any(|e| match e {
                ExportLine::Inferred { from, .. } => from == path,
                ExportLine::Declared { .. } => false,
            })
    }
}

/// Compiled line patterns.
#[derive(Debug, Clone)]
pub struct UnitParser {
    import: Regex,
    reexport: Regex,
    inferred: Regex,
    declared: Regex,
    global: Regex,
    use_site: Regex,
    directive: Regex,
}

impl UnitParser {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| -> Result<Regex> {
            Ok(Regex::new(pattern).with_context(|| format!("invalid unit pattern {pattern}"))?)
        };
        Ok(Self {
            import: compile(r#"^\s*import\s+"([^"]+)"\s*;?\s*$"#)?,
            reexport: compile(r#"^\s*export\s+\*\s+from\s+"([^"]+)"\s*;?\s*$"#)?,
            inferred: compile(
                r#"^\s*export\s+let\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*"([^"]+)"\.([A-Za-z_][A-Za-z0-9_]*)\s*;?\s*$"#,
            )?,
            declared: compile(r#"^\s*export\s+([A-Za-z_]+)\s+([A-Za-z_][A-Za-z0-9_]*)\s*(.*?)\s*;?\s*$"#)?,
            global: compile(r#"^\s*declare\s+global\b"#)?,
            use_site: compile(r#"\buse\s+"([^"]+)"\.([A-Za-z_][A-Za-z0-9_]*)"#)?,
            directive: compile(r#"^\s*!(error|warn)\s+(.*?)\s*$"#)?,
        })
    }

    pub fn parse(&self, text: &str) -> ParsedUnit {
        let mut unit = ParsedUnit::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx as u32 + 1;

            if let Some(caps) = self.directive.captures(raw) {
                let category = if &caps[1] == "error" {
                    DiagnosticCategory::Error
                } else {
                    DiagnosticCategory::Warning
                };
                unit.directives.push(Directive {
                    category,
                    message: caps[2].to_string(),
                    line,
                });
                continue;
            }

            if let Some(caps) = self.import.captures(raw) {
                unit.imports.push(ImportLine {
                    path: normalize_unit_path(&caps[1]),
                    reexport: false,
                    line,
                });
                continue;
            }

            if let Some(caps) = self.reexport.captures(raw) {
                unit.imports.push(ImportLine {
                    path: normalize_unit_path(&caps[1]),
                    reexport: true,
                    line,
                });
                continue;
            }

            if let Some(caps) = self.inferred.captures(raw) {
                unit.exports.push(ExportLine::Inferred {
                    name: caps[1].to_string(),
                    from: normalize_unit_path(&caps[2]),
                    member: caps[3].to_string(),
                    line,
                });
                continue;
            }

            if let Some(caps) = self.declared.captures(raw) {
                unit.exports.push(ExportLine::Declared {
                    kind: caps[1].to_string(),
                    name: caps[2].to_string(),
                    shape: normalize_shape(&caps[3]),
                    line,
                });
                continue;
            }

            if self.global.is_match(raw) {
                unit.declares_global = true;
                continue;
            }

            for caps in self.use_site.captures_iter(raw) {
                unit.uses.push(UseSite {
                    from: normalize_unit_path(&caps[1]),
                    member: caps[2].to_string(),
                    line,
                });
            }
        }

        unit
    }
}

/// Collapse runs of whitespace so formatting-only edits keep the shape.
fn normalize_shape(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
