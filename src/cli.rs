// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procline`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procline",
    version,
    about = "Drive a line-oriented program over its stdin/stdout from a TOML session file.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the session file (TOML).
    ///
    /// Default: `Procline.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Procline.toml")]
    pub config: String,

    /// Print every line the child writes to stdout as it is read.
    #[arg(long)]
    pub echo: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCLINE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the session, but don't start the process.
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
