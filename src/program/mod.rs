// src/program/mod.rs

pub mod builder;
pub mod emit;
pub mod host;
pub mod options;
pub mod snapshot;

pub use builder::{AffectedDiagnostics, AffectedEmit, BuilderPhase, BuilderProgram};
pub use emit::{PendingEmit, PendingEmitQueue};
pub use host::{CompilerHost, EmitOutput};
pub use options::{BuilderOptions, CancellationToken};
pub use snapshot::{ProgramSnapshot, SourceUnit};
