// src/exec/process.rs

//! Production process backend built on `tokio::process`.

use std::fmt;
use std::future::Future;
use std::io::PipeReader;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::Context;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::errors::{Result, SupervisorError};

use super::backend::{ManagedChild, OutputReader, ProcessLauncher, WaitOutcome};

/// Spawns real OS processes.
///
/// Children get a null stdin and a single pipe shared by stdout and stderr,
/// and are killed if their handle is dropped while still running.
#[derive(Debug, Clone, Default)]
pub struct TokioLauncher {
    working_dir: Option<PathBuf>,
}

impl TokioLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run children from `dir` instead of the supervisor's own cwd.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl ProcessLauncher for TokioLauncher {
    fn launch(&self, argv: &[String]) -> Result<Box<dyn ManagedChild>> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SupervisorError::LaunchError("empty command line".to_string()))?;

        let (reader, writer) = std::io::pipe()
            .map_err(|e| SupervisorError::LaunchError(format!("creating output pipe: {e}")))?;
        let writer_for_stderr = writer
            .try_clone()
            .map_err(|e| SupervisorError::LaunchError(format!("creating output pipe: {e}")))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(writer_for_stderr))
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let spawned = cmd.spawn();
        // Close our copies of the write end, or the reader never sees EOF.
        drop(cmd);
        let child = spawned
            .map_err(|e| SupervisorError::LaunchError(format!("spawning {program}: {e}")))?;

        debug!(pid = child.id(), program = %program, "spawned child process");

        let output = async_output(reader)
            .map_err(|e| SupervisorError::LaunchError(format!("registering output pipe: {e}")))?;

        Ok(Box::new(TokioChild {
            child,
            output: Some(output),
            status: None,
        }))
    }
}

#[cfg(unix)]
fn async_output(reader: PipeReader) -> std::io::Result<OutputReader> {
    use std::os::fd::OwnedFd;
    use tokio::net::unix::pipe;

    let receiver = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;
    Ok(Box::new(receiver))
}

/// No readiness-based pipes here: a plain thread does the blocking reads
/// and feeds an in-memory pipe.
#[cfg(not(unix))]
fn async_output(mut reader: PipeReader) -> std::io::Result<OutputReader> {
    use std::io::Read;
    use tokio::io::AsyncWriteExt;

    let (mut tx, rx) = tokio::io::duplex(64 * 1024);
    let runtime = tokio::runtime::Handle::current();
    std::thread::Builder::new()
        .name("svckeeper-output".to_string())
        .spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if runtime.block_on(tx.write_all(&buf[..n])).is_err() {
                            break;
                        }
                    }
                }
            }
        })?;
    Ok(Box::new(rx))
}

/// A `tokio::process::Child` plus its output pipe and cached exit status.
pub struct TokioChild {
    child: Child,
    output: Option<OutputReader>,
    status: Option<ExitStatus>,
}

impl fmt::Debug for TokioChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioChild")
            .field("child", &self.child)
            .field("output", &self.output.is_some())
            .field("status", &self.status)
            .finish()
    }
}

impl TokioChild {
    fn record(&mut self, status: ExitStatus) {
        debug!(?status, "child exit status collected");
        self.status = Some(status);
    }
}

impl ManagedChild for TokioChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_output(&mut self) -> Option<OutputReader> {
        self.output.take()
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> anyhow::Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        // Already reaped: nothing left to signal.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid).context("pid out of range")?;
        kill(Pid::from_raw(pid), Signal::SIGTERM)
            .with_context(|| format!("sending SIGTERM to pid {pid}"))?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> anyhow::Result<()> {
        // No cooperative signal on this platform; fall back to a kill request.
        self.child.start_kill().context("requesting child termination")
    }

    fn kill(&mut self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.child.kill().await.context("killing child process")?;
            if let Ok(Some(status)) = self.child.try_wait() {
                self.record(status);
            }
            Ok(())
        })
    }

    fn wait_exit(&mut self, limit: Duration) -> Pin<Box<dyn Future<Output = WaitOutcome> + Send + '_>> {
        Box::pin(async move {
            if self.status.is_some() {
                return WaitOutcome::Exited;
            }
            match tokio::time::timeout(limit, self.child.wait()).await {
                Ok(Ok(status)) => {
                    self.record(status);
                    WaitOutcome::Exited
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "waiting for child process failed");
                    WaitOutcome::StillRunning
                }
                Err(_) => WaitOutcome::StillRunning,
            }
        })
    }

    fn try_exit_code(&mut self) -> Option<i32> {
        if self.status.is_none() {
            match self.child.try_wait() {
                Ok(Some(status)) => self.record(status),
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "polling child exit status failed");
                    return None;
                }
            }
        }
        self.status.and_then(exit_code_of)
    }
}

/// The process's own exit code, or `128 + signal` for a signal death as
/// shells report it.
fn exit_code_of(status: ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal().map(|sig| 128 + sig)
    }
    #[cfg(not(unix))]
    {
        None
    }
}
