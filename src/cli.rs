// src/cli.rs

use clap::{Parser, ValueEnum};

/// Command-line arguments for `incbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "incbuild",
    version,
    about = "Incrementally check and emit a project of .unit files.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the project config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Incbuild.toml")]
    pub config: String,

    /// Keep running and rebuild whenever a unit changes.
    #[arg(long)]
    pub watch: bool,

    /// Ignore persisted state; recheck and re-emit every unit.
    #[arg(long)]
    pub force: bool,

    /// Load the project and print units, dependencies and import cycles
    /// without checking or emitting anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the transitive dependencies of a unit and exit.
    #[arg(long, value_name = "UNIT")]
    pub deps: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `INCBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
