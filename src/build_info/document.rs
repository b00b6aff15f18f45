// src/build_info/document.rs

//! On-disk shape of the build info document (JSON, camelCase keys).
//!
//! Units are stored once in a table and referenced everywhere else by their
//! index in that table.

use serde::{Deserialize, Serialize};

use crate::diagnostics::CompactDiagnostic;
use crate::types::EmitKind;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub tool_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_hash: Option<String>,

    #[serde(default = "default_true")]
    pub dependency_tracking: bool,

    pub units: Vec<UnitRecord>,

    /// `[importer, imported]` index pairs.
    #[serde(default)]
    pub dependency_edges: Vec<(u32, u32)>,

    /// `[exporter, exported]` index pairs.
    #[serde(default)]
    pub export_edges: Vec<(u32, u32)>,

    #[serde(default)]
    pub pending_emit: Vec<PendingEmitRecord>,

    #[serde(default)]
    pub pending_emit_cursor: usize,

    /// Units still owed a recheck when the document was written.
    #[serde(default)]
    pub pending_check: Vec<PendingCheckRecord>,

    /// `[unit index, diagnostics]` pairs. Absent when diagnostics are not
    /// persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<(u32, Vec<CompactDiagnostic>)>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRecord {
    pub path: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default)]
    pub is_global: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEmitRecord {
    pub unit_idx: u32,
    pub kind: EmitKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCheckRecord {
    pub unit_idx: u32,
    /// The unit's pass still has to mark every unit.
    #[serde(default)]
    pub global: bool,
}

/// Only the version field; read before the full document so a document from
/// another tool version is rejected even if its layout differs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VersionProbe {
    pub tool_version: String,
}
