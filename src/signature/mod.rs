// src/signature/mod.rs

//! Content hashing for units.
//!
//! Two digests are tracked per unit:
//!
//! - the *version*: a hash of the full text, answering "did the bytes change";
//! - the *signature*: a hash of the exported-declaration shape, computed only
//!   after a successful check. Edits that leave the public interface alone
//!   keep the signature stable, which is what lets propagation stop early.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;

/// Signature state of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Signature {
    /// Not checked since the version last changed, or the checker failed.
    #[default]
    Unsignatured,
    /// Shape hash from the last successful check.
    Signatured(String),
}

impl Signature {
    pub fn is_signatured(&self) -> bool {
        matches!(self, Signature::Signatured(_))
    }

    pub fn as_hash(&self) -> Option<&str> {
        match self {
            Signature::Signatured(hash) => Some(hash.as_str()),
            Signature::Unsignatured => None,
        }
    }

    pub fn from_option(hash: Option<String>) -> Self {
        match hash {
            Some(hash) => Signature::Signatured(hash),
            None => Signature::Unsignatured,
        }
    }

    /// Whether moving from `self` to `new` must propagate to dependents.
    ///
    /// An absent signature on either side counts as a change.
    pub fn differs_from(&self, new: &Signature) -> bool {
        match (self, new) {
            (Signature::Signatured(old), Signature::Signatured(new)) => old != new,
            _ => true,
        }
    }
}

/// One externally visible declaration of a unit, as reported by the checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportedDeclaration {
    pub name: String,
    /// Declaration kind, e.g. `fn`, `type`, `let`.
    pub kind: String,
    /// Serialized shape (type text) of the declaration.
    pub shape: String,
    /// True when the shape was inferred rather than written out.
    #[serde(default)]
    pub inferred: bool,
}

impl ExportedDeclaration {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, shape: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            shape: shape.into(),
            inferred: false,
        }
    }

    pub fn inferred(mut self) -> Self {
        self.inferred = true;
        self
    }
}

/// Public interface of a checked unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInterface {
    pub declarations: Vec<ExportedDeclaration>,
}

impl PublicInterface {
    pub fn new(declarations: Vec<ExportedDeclaration>) -> Self {
        Self { declarations }
    }
}

/// Hash a unit's full text.
pub fn compute_version(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Hash a unit file through the filesystem abstraction, streaming its bytes.
///
/// Produces the same digest as [`compute_version`] on the file's text.
pub fn compute_file_version(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening unit for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash the exported shape of a unit.
///
/// Only declarations accepted by `counts` take part; which declarations form
/// the "publicly visible shape" is the checker's policy. Declaration order
/// does not matter.
pub fn compute_signature<F>(interface: &PublicInterface, counts: F) -> String
where
    F: Fn(&ExportedDeclaration) -> bool,
{
    let mut visible: Vec<&ExportedDeclaration> = interface
        .declarations
        .iter()
        .filter(|decl| counts(decl))
        .collect();
    visible.sort_by(|a, b| {
        (a.name.as_str(), a.kind.as_str(), a.shape.as_str())
            .cmp(&(b.name.as_str(), b.kind.as_str(), b.shape.as_str()))
    });

    let mut hasher = Hasher::new();
    for decl in &visible {
        // Length prefixes keep field boundaries unambiguous.
        for field in [decl.kind.as_str(), decl.name.as_str(), decl.shape.as_str()] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(declarations = visible.len(), hash = %hash, "computed interface signature");
    hash
}
