// src/lib.rs

pub mod affected;
pub mod build_info;
pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod errors;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod program;
pub mod project;
pub mod signature;
pub mod state;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::build_info::{BuildInfoStore, FileBuildInfoStore, MemoryBuildInfoStore};
use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_and_validate};
use crate::driver::{CycleReport, Driver, DriverEvent};
use crate::fs::{FileSystem, RealFileSystem};
use crate::program::{BuilderProgram, CompilerHost};
use crate::project::{DiskCompilerHost, UnitMatcher};
use crate::types::BuildInfoStorageMode;

/// How a run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub errors: usize,
    pub cancelled: bool,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            130
        } else if self.errors > 0 {
            1
        } else {
            0
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// Loads the config, builds the disk host, rehydrates the builder from the
/// build info store and runs the driver (once, or in watch mode).
pub async fn run(args: CliArgs) -> Result<RunOutcome> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {:?}", config_path))?;
    let root = config_root_dir(&config_path);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let host = DiskCompilerHost::from_config(Arc::clone(&fs), &root, &cfg)?;
    let options = cfg.builder_options();

    if args.dry_run || args.deps.is_some() {
        let program = BuilderProgram::new(host, options)?;
        match &args.deps {
            Some(unit) => print_dependencies(&program, unit)?,
            None => print_dry_run(&cfg, &program),
        }
        return Ok(RunOutcome::default());
    }

    let store = open_store(&cfg, &root, Arc::clone(&fs));
    let document = match store.load() {
        Ok(document) => document,
        Err(e) => {
            warn!(error = %e, "failed to read build info; starting fresh");
            None
        }
    };

    let mut program = BuilderProgram::from_build_info(host, options, document.as_deref())?;
    if args.force {
        info!("--force given; rechecking every unit");
        program.force_full_rebuild();
    }

    let (tx, rx) = mpsc::channel::<DriverEvent>(64);

    let _watcher_handle = if args.watch {
        let matcher = UnitMatcher::from_config(&cfg.units)?;
        Some(crate::watch::spawn_watcher(root.clone(), matcher, tx.clone())?)
    } else {
        None
    };

    // Ctrl-C: stop at the next unit boundary, persist, exit.
    {
        let token = program.cancellation_token();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            token.cancel();
            let _ = tx.send(DriverEvent::ShutdownRequested).await;
        });
    }

    let mut driver = Driver::new(program, store);
    let report = driver.run(rx, args.watch, print_report).await?;

    Ok(RunOutcome {
        errors: report.error_count(),
        cancelled: report.cancelled,
    })
}

fn open_store(cfg: &ConfigFile, root: &Path, fs: Arc<dyn FileSystem>) -> Box<dyn BuildInfoStore> {
    match cfg.config.build_info_storage {
        BuildInfoStorageMode::File => {
            Box::new(FileBuildInfoStore::new(root.join(&cfg.config.build_info), fs))
        }
        BuildInfoStorageMode::Memory => Box::new(MemoryBuildInfoStore::new()),
    }
}

/// Directory containing the config file, or the current directory for a
/// bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_report(report: &CycleReport) {
    for diagnostic in report.diagnostics() {
        println!("{diagnostic}");
    }
    println!(
        "checked {} unit(s), emitted {} unit(s), {} error(s){}",
        report.checked.len(),
        report.emitted.len(),
        report.error_count(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
}

fn print_dependencies<H: CompilerHost>(program: &BuilderProgram<H>, unit: &str) -> Result<()> {
    let deps = program.get_all_dependencies_of(unit)?;
    for dep in deps {
        println!("{dep}");
    }
    Ok(())
}

fn print_dry_run<H: CompilerHost>(cfg: &ConfigFile, program: &BuilderProgram<H>) {
    let graph = program.state().graph();

    println!("incbuild dry-run");
    println!("  config.dependency_tracking = {}", cfg.config.dependency_tracking);
    println!("  config.emit_declarations = {}", cfg.config.emit_declarations);
    println!("  config.include_inferred_types = {}", cfg.config.include_inferred_types);
    println!("  config.build_info = {:?}", cfg.config.build_info);
    println!("  config.out_dir = {:?}", cfg.config.out_dir);
    println!();

    println!("units ({}):", graph.len());
    for unit in graph.units() {
        println!("  - {}", graph.path_of(unit));
        if program.state().info(unit).affects_global_scope {
            println!("      global: true");
        }
        let deps: Vec<&str> = graph
            .dependencies_of(unit)
            .iter()
            .map(|d| graph.path_of(*d))
            .collect();
        if !deps.is_empty() {
            println!("      imports: {:?}", deps);
        }
    }

    let cycles = graph.import_cycles();
    if !cycles.is_empty() {
        println!();
        println!("import cycles ({}):", cycles.len());
        for cycle in cycles {
            println!("  - {}", cycle.join(" -> "));
        }
    }

    debug!("dry-run complete (nothing checked or emitted)");
}
