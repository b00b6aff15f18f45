// src/state/unit_info.rs

use crate::signature::Signature;

/// What the builder remembers about one unit between checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInfo {
    /// Hash of the unit's full text.
    pub version: String,
    /// Shape hash; `Unsignatured` until checked at this version.
    pub signature: Signature,
    /// Whether the unit contributes declarations to the global scope.
    pub affects_global_scope: bool,
}

impl UnitInfo {
    /// Record for a unit whose text has not been checked yet.
    pub fn unchecked(version: impl Into<String>, affects_global_scope: bool) -> Self {
        Self {
            version: version.into(),
            signature: Signature::Unsignatured,
            affects_global_scope,
        }
    }
}
