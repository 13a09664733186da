// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `fetchdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fetchdag",
    version,
    about = "Fetch records from dependent sources in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Print every source's records instead of only the last one.
    #[arg(long)]
    pub all: bool,

    /// Override a shared option, e.g. `--set region="us"` or `--set limit=10`.
    ///
    /// The value is parsed as JSON and falls back to a plain string.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, the `FETCHDAG_LOG` filter directives or `info` are used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the execution order, but don't fetch anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
