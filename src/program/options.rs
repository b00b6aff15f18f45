// src/program/options.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use blake3::Hasher;

use crate::errors::{IncbuildError, Result};

/// Builder behaviour derived from `[config]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderOptions {
    /// When false, every change invalidates the whole program.
    pub dependency_tracking: bool,
    /// Queue a types-only emit for dependents whose signature moved.
    pub emit_declarations: bool,
    /// Write cached diagnostics into the build info document.
    pub persist_diagnostics: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            dependency_tracking: true,
            emit_declarations: true,
            persist_diagnostics: true,
        }
    }
}

impl BuilderOptions {
    /// Hash of every option that can change checking or emit results,
    /// together with the host's policy key.
    ///
    /// `persist_diagnostics` only affects what is written to disk and is left
    /// out.
    pub fn fingerprint(&self, policy_key: &str) -> String {
        let mut hasher = Hasher::new();
        hasher.update(b"dependency_tracking=");
        hasher.update(&[self.dependency_tracking as u8]);
        hasher.update(b";emit_declarations=");
        hasher.update(&[self.emit_declarations as u8]);
        hasher.update(b";policy=");
        hasher.update(policy_key.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

/// Cooperative cancellation flag, polled by the builder between units.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(IncbuildError::Cancelled)
        } else {
            Ok(())
        }
    }
}
