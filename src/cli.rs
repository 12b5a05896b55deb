// src/cli.rs

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::RedeployPolicy;

/// `svckeeper`: deploy, run and babysit one bundled server process.
///
/// Once running, type `start`, `stop`, `status` or `quit` on stdin.
#[derive(Debug, Clone, Parser)]
#[command(name = "svckeeper", version)]
pub struct CliArgs {
    /// Settings file. Missing file means built-in defaults; relative paths
    /// inside it resolve against its directory.
    #[arg(long, value_name = "PATH", default_value = "Svckeeper.toml")]
    pub config: PathBuf,

    /// Issue `start` right away.
    #[arg(long)]
    pub autostart: bool,

    /// Replace the settings file's `[artifact].redeploy` policy.
    #[arg(long, value_name = "if-missing|if-changed|always")]
    pub redeploy: Option<RedeployPolicy>,

    /// Log level; takes precedence over `SVCKEEPER_LOG`.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Show the resolved paths and command line, then exit. Nothing is
    /// copied or spawned.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The level as an `EnvFilter` directive.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
