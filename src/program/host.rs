// src/program/host.rs

//! Contract between the builder and the compiler it drives.
//!
//! The builder never parses, binds, checks or emits anything itself. It asks
//! a [`CompilerHost`] for a program snapshot, for per-unit diagnostics, for a
//! unit's public interface and for emit, and keeps the bookkeeping in between.
//! Tests plug in a fake host; the `incbuild` binary uses
//! [`crate::project::DiskCompilerHost`].

use std::path::PathBuf;

use crate::diagnostics::Diagnostic;
use crate::errors::Result;
use crate::program::snapshot::ProgramSnapshot;
use crate::signature::{ExportedDeclaration, PublicInterface};
use crate::types::{EmitKind, UnitPath};

/// What the emitter produced for one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitOutput {
    pub written_files: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

pub trait CompilerHost {
    /// Take a snapshot of the whole program as it is now.
    ///
    /// `changed` lists the paths reported as changed since the previous
    /// snapshot. It is a hint: the builder relies on the versions in the
    /// returned snapshot, not on the list.
    fn snapshot(&mut self, changed: &[UnitPath]) -> Result<ProgramSnapshot>;

    /// Type-check one unit against the most recent snapshot.
    fn check_unit(&mut self, unit: &str) -> Result<Vec<Diagnostic>>;

    /// Externally visible declarations of a checked unit.
    fn public_interface_of(&mut self, unit: &str) -> Result<PublicInterface>;

    /// Emit one unit.
    fn emit_unit(&mut self, unit: &str, kind: EmitKind) -> Result<EmitOutput>;

    /// Whether `decl` is part of the publicly visible shape hashed into the
    /// unit's signature.
    fn counts_toward_signature(&self, _decl: &ExportedDeclaration) -> bool {
        true
    }

    /// Short description of the host's checking policy. Folded into the
    /// options fingerprint so a policy change invalidates persisted state.
    fn policy_key(&self) -> String {
        String::new()
    }
}

impl<H: CompilerHost + ?Sized> CompilerHost for Box<H> {
    fn snapshot(&mut self, changed: &[UnitPath]) -> Result<ProgramSnapshot> {
        (**self).snapshot(changed)
    }

    fn check_unit(&mut self, unit: &str) -> Result<Vec<Diagnostic>> {
        (**self).check_unit(unit)
    }

    fn public_interface_of(&mut self, unit: &str) -> Result<PublicInterface> {
        (**self).public_interface_of(unit)
    }

    fn emit_unit(&mut self, unit: &str, kind: EmitKind) -> Result<EmitOutput> {
        (**self).emit_unit(unit, kind)
    }

    fn counts_toward_signature(&self, decl: &ExportedDeclaration) -> bool {
        (**self).counts_toward_signature(decl)
    }

    fn policy_key(&self) -> String {
        (**self).policy_key()
    }
}
