// src/driver/mod.rs

//! Async shell around a [`BuilderProgram`].
//!
//! The driver owns the program and a build info store. Each cycle drains the
//! affected units, drains pending emits and persists the resulting state.
//! Watch mode repeats the cycle for every [`DriverEvent::UnitsChanged`].

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::build_info::BuildInfoStore;
use crate::diagnostics::Diagnostic;
use crate::errors::{IncbuildError, Result};
use crate::program::{AffectedDiagnostics, AffectedEmit, BuilderProgram, CompilerHost};
use crate::types::UnitPath;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    UnitsChanged(Vec<UnitPath>),
    ShutdownRequested,
}

/// Outcome of one check/emit/persist cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub checked: Vec<AffectedDiagnostics>,
    pub emitted: Vec<AffectedEmit>,
    /// The cycle stopped early; unfinished work was persisted.
    pub cancelled: bool,
}

impl CycleReport {
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.checked
            .iter()
            .flat_map(|c| c.diagnostics.iter())
            .chain(self.emitted.iter().flat_map(|e| e.diagnostics.iter()))
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics().filter(|d| d.is_error()).count()
    }
}

pub struct Driver<H: CompilerHost> {
    program: BuilderProgram<H>,
    store: Box<dyn BuildInfoStore>,
}

impl<H: CompilerHost> fmt::Debug for Driver<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("phase", &self.program.phase())
            .field("units", &self.program.state().len())
            .finish_non_exhaustive()
    }
}

impl<H: CompilerHost> Driver<H> {
    pub fn new(program: BuilderProgram<H>, store: Box<dyn BuildInfoStore>) -> Self {
        Self { program, store }
    }

    pub fn program(&self) -> &BuilderProgram<H> {
        &self.program
    }

    /// Check and emit everything affected, then persist.
    ///
    /// Cancellation is not an error: whatever was done is persisted and the
    /// report is marked cancelled.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let outcome = self.drain(&mut report);
        self.persist()?;

        match outcome {
            Ok(()) => {}
            Err(IncbuildError::Cancelled) => {
                warn!(
                    pending_check = self.program.pending_check_paths().len(),
                    "build cancelled; unfinished work persisted"
                );
                report.cancelled = true;
            }
            Err(e) => return Err(e),
        }

        info!(
            checked = report.checked.len(),
            emitted = report.emitted.len(),
            errors = report.error_count(),
            "build cycle finished"
        );
        Ok(report)
    }

    fn drain(&mut self, report: &mut CycleReport) -> Result<()> {
        while let Some(next) = self.program.get_next_affected_file_diagnostics()? {
            report.checked.push(next);
        }
        while let Some(next) = self.program.emit_next_affected_file()? {
            report.emitted.push(next);
        }
        Ok(())
    }

    pub fn persist(&mut self) -> Result<()> {
        let document = self.program.build_info_json()?;
        self.store.save(&document)
    }

    /// Run one cycle, then (in watch mode) one cycle per change report until
    /// shutdown is requested or the event channel closes.
    ///
    /// `on_cycle` is called with every finished cycle.
    pub async fn run<F>(
        &mut self,
        mut events: mpsc::Receiver<DriverEvent>,
        watch: bool,
        mut on_cycle: F,
    ) -> Result<CycleReport>
    where
        F: FnMut(&CycleReport),
    {
        let mut last = self.run_cycle()?;
        on_cycle(&last);
        if !watch || last.cancelled {
            return Ok(last);
        }

        info!("watching for changes");
        while let Some(event) = events.recv().await {
            let mut changed = match event {
                DriverEvent::UnitsChanged(paths) => paths,
                DriverEvent::ShutdownRequested => break,
            };

            // Reports that queued up while the previous cycle ran are merged
            // into one.
            let mut shutdown = false;
            while let Ok(next) = events.try_recv() {
                match next {
                    DriverEvent::UnitsChanged(paths) => changed.extend(paths),
                    DriverEvent::ShutdownRequested => {
                        shutdown = true;
                        break;
                    }
                }
            }
            if shutdown {
                break;
            }

            debug!(?changed, "processing change report");
            if let Err(e) = self.program.report_changed(&changed) {
                warn!(error = %e, "could not take a program snapshot; waiting for the next change");
                continue;
            }
            last = self.run_cycle()?;
            on_cycle(&last);
            if last.cancelled {
                break;
            }
        }

        info!("driver stopped");
        Ok(last)
    }
}
