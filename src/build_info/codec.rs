// src/build_info/codec.rs

use tracing::{debug, warn};

use crate::affected::PendingCheck;
use crate::build_info::document::{
    BuildInfo, PendingCheckRecord, PendingEmitRecord, UnitRecord, VersionProbe,
};
use crate::cache::DiagnosticsCache;
use crate::diagnostics::Diagnostic;
use crate::errors::{IncbuildError, Result};
use crate::graph::{DependencyGraph, UnitId};
use crate::program::emit::{PendingEmit, PendingEmitQueue};
use crate::signature::Signature;
use crate::state::{BuilderState, UnitInfo};
use crate::types::UnitPath;

/// Version stamped into every document. A document carrying any other value
/// is rejected as a whole.
pub const BUILD_INFO_TOOL_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+buildinfo.1");

/// Everything the builder persists.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfoInput<'a> {
    pub state: &'a BuilderState,
    pub pending_emit: &'a PendingEmitQueue,
    pub pending_check: &'a [PendingCheck],
    pub diagnostics: Option<&'a DiagnosticsCache>,
    pub options_hash: Option<&'a str>,
}

/// Everything recovered from a document.
#[derive(Debug, Clone)]
pub struct DecodedBuildInfo {
    pub state: BuilderState,
    pub pending_emit: PendingEmitQueue,
    pub pending_check: Vec<PendingCheck>,
    pub diagnostics: Vec<(UnitPath, Vec<Diagnostic>)>,
    pub options_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BuildInfoCodec {
    tool_version: String,
}

impl Default for BuildInfoCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildInfoCodec {
    pub fn new() -> Self {
        Self::with_tool_version(BUILD_INFO_TOOL_VERSION)
    }

    pub fn with_tool_version(version: impl Into<String>) -> Self {
        Self {
            tool_version: version.into(),
        }
    }

    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    pub fn serialize(&self, input: BuildInfoInput<'_>) -> BuildInfo {
        let graph = input.state.graph();

        let units: Vec<UnitRecord> = input
            .state
            .entries()
            .map(|(path, info)| UnitRecord {
                path: path.to_string(),
                version: info.version.clone(),
                signature: info.signature.as_hash().map(str::to_string),
                is_global: info.affects_global_scope,
            })
            .collect();

        let index_of = |path: &str| graph.unit_id(path).map(|id| id.index() as u32);

        // Entries for units no longer in the program are dropped; the cursor
        // moves back by the number dropped ahead of it.
        let mut pending_emit = Vec::new();
        let mut cursor = input.pending_emit.cursor();
        for (position, entry) in input.pending_emit.entries().iter().enumerate() {
            match index_of(&entry.unit) {
                Some(unit_idx) => pending_emit.push(PendingEmitRecord {
                    unit_idx,
                    kind: entry.kind,
                }),
                None if position < input.pending_emit.cursor() => cursor -= 1,
                None => {}
            }
        }

        let pending_check: Vec<PendingCheckRecord> = input
            .pending_check
            .iter()
            .filter_map(|check| {
                Some(PendingCheckRecord {
                    unit_idx: index_of(&check.unit)?,
                    global: check.global,
                })
            })
            .collect();

        let diagnostics = input.diagnostics.map(|cache| {
            cache
                .iter_sorted()
                .into_iter()
                .filter_map(|(unit, version, diagnostics)| {
                    let id = graph.unit_id(unit)?;
                    if input.state.info(id).version != version {
                        return None;
                    }
                    let compact = diagnostics.iter().map(Diagnostic::to_compact).collect();
                    Some((id.index() as u32, compact))
                })
                .collect()
        });

        let to_indices = |edges: Vec<(UnitId, UnitId)>| -> Vec<(u32, u32)> {
            edges
                .into_iter()
                .map(|(from, to)| (from.index() as u32, to.index() as u32))
                .collect()
        };

        let document = BuildInfo {
            tool_version: self.tool_version.clone(),
            options_hash: input.options_hash.map(str::to_string),
            dependency_tracking: graph.is_tracking(),
            units,
            dependency_edges: to_indices(graph.dependency_edges()),
            export_edges: to_indices(graph.export_edges()),
            pending_emit,
            pending_emit_cursor: cursor,
            pending_check,
            diagnostics,
        };

        debug!(
            units = document.units.len(),
            edges = document.dependency_edges.len(),
            pending_emit = document.pending_emit.len(),
            pending_check = document.pending_check.len(),
            "serialized build info"
        );
        document
    }

    pub fn deserialize(&self, document: BuildInfo) -> Result<DecodedBuildInfo> {
        self.check_version(&document.tool_version)?;

        let paths: Vec<UnitPath> = document.units.iter().map(|u| u.path.clone()).collect();
        let graph = DependencyGraph::from_indexed(
            paths,
            &document.dependency_edges,
            &document.export_edges,
            document.dependency_tracking,
        )?;

        let infos: Vec<UnitInfo> = document
            .units
            .iter()
            .map(|u| UnitInfo {
                version: u.version.clone(),
                signature: Signature::from_option(u.signature.clone()),
                affects_global_scope: u.is_global,
            })
            .collect();

        let unit_count = document.units.len();
        let path_at = |idx: u32, what: &str| -> Result<UnitPath> {
            document
                .units
                .get(idx as usize)
                .map(|u| u.path.clone())
                .ok_or_else(|| {
                    IncbuildError::BuildInfoMalformed(format!(
                        "{what} references unit index {idx} but only {unit_count} units exist"
                    ))
                })
        };

        let mut entries = Vec::with_capacity(document.pending_emit.len());
        for record in &document.pending_emit {
            entries.push(PendingEmit {
                unit: path_at(record.unit_idx, "pending emit")?,
                kind: record.kind,
            });
        }
        if document.pending_emit_cursor > entries.len() {
            warn!(
                cursor = document.pending_emit_cursor,
                entries = entries.len(),
                "pending emit cursor past the end; clamping"
            );
        }
        let pending_emit = PendingEmitQueue::from_parts(entries, document.pending_emit_cursor);

        let pending_check = document
            .pending_check
            .iter()
            .map(|record| {
                let unit = path_at(record.unit_idx, "pending check")?;
                Ok(PendingCheck::new(unit, record.global))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut diagnostics = Vec::new();
        for (idx, compact) in document.diagnostics.clone().unwrap_or_default() {
            let unit = path_at(idx, "diagnostics")?;
            let expanded = compact.into_iter().map(|d| d.expand(&unit)).collect();
            diagnostics.push((unit, expanded));
        }

        let state = BuilderState::from_parts(graph, infos)?;
        debug!(
            units = state.len(),
            pending_check = pending_check.len(),
            cached = diagnostics.len(),
            "decoded build info"
        );

        Ok(DecodedBuildInfo {
            state,
            pending_emit,
            pending_check,
            diagnostics,
            options_hash: document.options_hash,
        })
    }

    /// Parse and decode a JSON document.
    pub fn deserialize_str(&self, text: &str) -> Result<DecodedBuildInfo> {
        let probe: VersionProbe = serde_json::from_str(text)?;
        self.check_version(&probe.tool_version)?;
        let document: BuildInfo = serde_json::from_str(text)?;
        self.deserialize(document)
    }

    pub fn to_json(document: &BuildInfo) -> Result<String> {
        Ok(serde_json::to_string_pretty(document)?)
    }

    fn check_version(&self, found: &str) -> Result<()> {
        if found != self.tool_version {
            return Err(IncbuildError::BuildInfoVersionMismatch {
                expected: self.tool_version.clone(),
                found: found.to_string(),
            });
        }
        Ok(())
    }
}
