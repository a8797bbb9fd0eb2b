// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `statecraft`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "statecraft",
    version,
    about = "Materialize a graph of idempotent resources with maximum safe parallelism.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the runtime config file (TOML).
    ///
    /// When omitted, `Statecraft.toml` in the current directory is used if it
    /// exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STATECRAFT_LOG`, then the config file, then `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Build and validate the resource graph, print it, but don't materialize.
    #[arg(long)]
    pub dry_run: bool,

    /// Directory the provisioning graph writes into.
    #[arg(long, value_name = "DIR", default_value = "statecraft-root")]
    pub root: PathBuf,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
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
