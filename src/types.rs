use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical unit key: a project-relative path with forward slashes.
pub type UnitPath = String;

/// Normalize a unit path so the same file always maps to the same key.
///
/// Backslashes become forward slashes, a leading `./` is dropped, and
/// redundant `.` segments are removed.
pub fn normalize_unit_path(raw: &str) -> UnitPath {
    let replaced = raw.trim().replace('\\', "/");
    replaced
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// What kind of emit a unit still owes.
///
/// `Full` dominates `TypesOnly`: a unit that needs both is emitted fully once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitKind {
    /// Regenerate every output of the unit.
    Full,
    /// Regenerate only the declaration (types) output.
    #[serde(rename = "types")]
    TypesOnly,
}

impl EmitKind {
    /// Combine two pending requests for the same unit.
    pub fn merge(self, other: EmitKind) -> EmitKind {
        match (self, other) {
            (EmitKind::TypesOnly, EmitKind::TypesOnly) => EmitKind::TypesOnly,
            _ => EmitKind::Full,
        }
    }
}

/// Where the build info document is kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildInfoStorageMode {
    /// Store the document on disk at `[config].build_info`.
    File,
    /// Keep the document in memory only (lost on restart).
    Memory,
}

impl Default for BuildInfoStorageMode {
    fn default() -> Self {
        BuildInfoStorageMode::File
    }
}

impl FromStr for BuildInfoStorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(BuildInfoStorageMode::File),
            "memory" => Ok(BuildInfoStorageMode::Memory),
            other => Err(format!(
                "invalid build_info_storage: {other} (expected \"file\" or \"memory\")"
            )),
        }
    }
}
