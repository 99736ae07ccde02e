// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `stylewatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stylewatch",
    version,
    about = "Compile stylesheets through a transform chain and recompile when their imports change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Stylewatch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Stylewatch.toml")]
    pub config: String,

    /// Compile every file once and exit, without watching.
    #[arg(long)]
    pub once: bool,

    /// Directory compiled files are written to.
    ///
    /// Overrides `out_dir` from the config file.
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STYLEWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, list the matched files and their output paths,
    /// but don't compile anything.
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
