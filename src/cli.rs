// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `geocompile`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "geocompile",
    version,
    about = "Build derived datasets through a dependency graph of targets.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the build description (TOML).
    ///
    /// Default: `Geocompile.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Geocompile.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `GEOCOMPILE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build every target whose status requires it.
    Build {
        /// Rebuild this target regardless of its status. Repeatable.
        #[arg(long = "force", value_name = "NAME")]
        force: Vec<String>,

        /// Only build this target and its prerequisites. Repeatable.
        #[arg(long = "target", value_name = "NAME")]
        targets: Vec<String>,

        /// Override `[config] workers`.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// Print what would be built without running any build step.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the stored status of every target and subtarget.
    Status,

    /// Mark a target `FORCED` so the next build rebuilds it.
    Force {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Remove a target's artifacts and mark it `MISSING`.
    Clean {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Print the targets and their dependency edges.
    Graph,
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
