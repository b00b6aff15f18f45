// src/watch/path_utils.rs

use std::path::{Path, PathBuf};

use crate::project::{UnitMatcher, unit_path_under};
use crate::types::UnitPath;

/// Unit path of an event path, relative to `root`.
///
/// Falls back to comparing canonical forms when the event path uses a
/// different absolute prefix for the same directory (symlinks, `/private/var`
/// on macOS). Canonicalizing fails for deleted files, so the direct attempt
/// comes first.
pub fn event_unit_path(root: &Path, path: &Path) -> Option<UnitPath> {
    if let Some(unit) = unit_path_under(root, path) {
        return Some(unit);
    }
    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok()?;
    unit_path_under(&root_canon, &path_canon)
}

/// Units touched by a batch of event paths, deduplicated, in first-seen order.
pub fn changed_units(root: &Path, paths: &[PathBuf], matcher: &UnitMatcher) -> Vec<UnitPath> {
    let mut out: Vec<UnitPath> = Vec::new();
    for path in paths {
        let Some(unit) = event_unit_path(root, path) else {
            continue;
        };
        if matcher.matches(&unit) && !out.contains(&unit) {
            out.push(unit);
        }
    }
    out
}
