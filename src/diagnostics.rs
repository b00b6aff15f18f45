// src/diagnostics.rs

//! Diagnostic model shared by the checker contract, the cache and the build
//! info document.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::UnitPath;

/// Code used for the synthetic diagnostic recorded when the checker or the
/// emitter fails for a unit.
pub const HOST_FAILURE_CODE: u32 = 6001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCategory {
    #[serde(rename = "e")]
    Error,
    #[serde(rename = "w")]
    Warning,
    #[serde(rename = "m")]
    Message,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Message => "message",
        };
        f.write_str(s)
    }
}

/// A single diagnostic produced for a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub unit: UnitPath,
    pub category: DiagnosticCategory,
    pub code: u32,
    pub message: String,
    /// 1-based line, when the producer knows it.
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn error(unit: impl Into<UnitPath>, code: u32, message: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            category: DiagnosticCategory::Error,
            code,
            message: message.into(),
            line: None,
        }
    }

    pub fn warning(unit: impl Into<UnitPath>, code: u32, message: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            category: DiagnosticCategory::Warning,
            code,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Synthetic diagnostic standing in for a collaborator failure.
    pub fn host_failure(unit: impl Into<UnitPath>, stage: &str, err: &dyn fmt::Display) -> Self {
        let unit = unit.into();
        let message = format!("{stage} failed for '{unit}': {err}");
        Self::error(unit, HOST_FAILURE_CODE, message)
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }

    /// Compact form used inside the build info document. The unit is implied
    /// by the surrounding unit index.
    pub fn to_compact(&self) -> CompactDiagnostic {
        CompactDiagnostic {
            category: self.category,
            code: self.code,
            message: self.message.clone(),
            line: self.line,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "{}:{}: {} IB{}: {}",
                self.unit, line, self.category, self.code, self.message
            ),
            None => write!(
                f,
                "{}: {} IB{}: {}",
                self.unit, self.category, self.code, self.message
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactDiagnostic {
    #[serde(rename = "k")]
    pub category: DiagnosticCategory,
    #[serde(rename = "c")]
    pub code: u32,
    #[serde(rename = "m")]
    pub message: String,
    #[serde(rename = "l", default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl CompactDiagnostic {
    pub fn expand(self, unit: &str) -> Diagnostic {
        Diagnostic {
            unit: unit.to_string(),
            category: self.category,
            code: self.code,
            message: self.message,
            line: self.line,
        }
    }
}
