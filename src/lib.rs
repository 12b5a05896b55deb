// src/lib.rs

pub mod cli;
pub mod command;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod supervisor;
pub mod types;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::command::{build_argv, display_command};
use crate::config::{ConfigFile, load_or_default};
use crate::exec::TokioLauncher;
use crate::fs::RealFileSystem;
use crate::supervisor::{ControlOutcome, SupervisorEvent, spawn_supervisor};
use crate::types::RedeployPolicy;

/// Commands accepted on stdin by the `svckeeper` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Start,
    Stop,
    Status,
    Quit,
}

impl FromStr for OperatorCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" => Ok(OperatorCommand::Start),
            "stop" => Ok(OperatorCommand::Stop),
            "status" => Ok(OperatorCommand::Status),
            "quit" | "exit" => Ok(OperatorCommand::Quit),
            other => Err(format!(
                "unknown command: {other} (expected start, stop, status or quit)"
            )),
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading (re-read on every `start`)
/// - the supervisor with the real filesystem and process backend
/// - an event printer (service output to stdout, status to the log)
/// - stdin commands and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone();
    let cfg = load_settings(&config_path, args.redeploy)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let (handle, mut events) = spawn_supervisor(
        cfg.supervisor_options(),
        Arc::new(RealFileSystem),
        TokioLauncher::new(),
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(event);
        }
    });

    let (op_tx, mut op_rx) = mpsc::channel::<OperatorCommand>(8);

    // Ctrl-C → stop the service and exit.
    {
        let tx = op_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(OperatorCommand::Quit).await;
        });
    }

    // stdin → operator commands.
    {
        let tx = op_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<OperatorCommand>() {
                    Ok(cmd) => {
                        if tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{e}"),
                }
            }
            debug!("stdin closed; waiting for Ctrl+C");
        });
    }

    if args.autostart {
        op_tx.send(OperatorCommand::Start).await?;
    }
    drop(op_tx);

    info!(config = ?config_path, "svckeeper ready (commands: start, stop, status, quit)");

    while let Some(cmd) = op_rx.recv().await {
        match cmd {
            OperatorCommand::Start => match load_settings(&config_path, args.redeploy) {
                Ok(fresh) => report(handle.start(fresh.service_config()).await?),
                Err(e) => error!(error = %e, "cannot start: settings invalid"),
            },
            OperatorCommand::Stop => report(handle.stop().await?),
            OperatorCommand::Status => info!(state = %handle.state(), "service status"),
            OperatorCommand::Quit => break,
        }
    }

    let outcome = handle.shutdown().await?;
    debug!(?outcome, "supervisor shut down");

    // Let trailing output drain; a child that ignored its kill may hold the
    // pipe a little longer, which is not worth blocking exit for.
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;
    Ok(())
}

/// Load settings and apply CLI overrides.
fn load_settings(path: &Path, redeploy: Option<RedeployPolicy>) -> Result<ConfigFile> {
    let mut cfg = load_or_default(path)?;
    if let Some(policy) = redeploy {
        cfg.artifact.redeploy = policy;
    }
    Ok(cfg)
}

fn print_event(event: SupervisorEvent) {
    match event {
        SupervisorEvent::Log(line) => println!("{line}"),
        SupervisorEvent::Status(message) => info!(target: "svckeeper::status", "{}", message),
        SupervisorEvent::StateChanged(state) => debug!(%state, "state changed"),
    }
}

fn report(outcome: ControlOutcome) {
    match outcome {
        ControlOutcome::Started { pid } => info!(?pid, "service started"),
        ControlOutcome::AlreadyRunning => info!("service already running"),
        ControlOutcome::StartFailed { reason } => error!(%reason, "service failed to start"),
        ControlOutcome::Stopped { exit_code, forced } => {
            info!(exit_code, forced, "service stopped")
        }
        ControlOutcome::NotRunning => info!("service not running"),
    }
}

/// Dry-run output: resolved paths and the command line, credential masked.
fn print_dry_run(cfg: &ConfigFile) {
    let options = cfg.supervisor_options();
    let executable = options.executable_path();
    let argv = build_argv(&executable, &cfg.service_config());

    println!("svckeeper dry-run");
    println!("  artifact: {}", options.artifact_name);
    println!("    bundled at:   {}", options.bundle_dir.join(&options.artifact_name).display());
    println!("    installed at: {}", executable.display());
    println!("    redeploy:     {:?}", options.redeploy);
    println!("  storage:      {}", cfg.storage.storage_path.display());
    println!("  history file: {}", cfg.storage.history_file.display());
    println!("  stop timeout: {:?}", options.stop_timeout);
    println!("  exit wait:    {:?}", options.exit_wait);
    println!();
    println!("command:");
    println!("  {}", display_command(&argv));

    debug!("dry-run complete (nothing deployed or spawned)");
}
