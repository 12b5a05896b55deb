// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! - `TokioLauncher` is the default implementation used by the binary. It
//!   spawns real OS processes with stdout and stderr sharing one pipe.
//! - Tests provide their own `ProcessLauncher` that hands out scripted
//!   children, so start/stop sequencing and timeouts can be checked without
//!   real processes or real time.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::AsyncRead;

use crate::errors::Result;

/// Read end of the child's combined output: stderr is redirected into the
/// same pipe as stdout, so lines keep the order the child wrote them in.
pub type OutputReader = Box<dyn AsyncRead + Send + Unpin>;

/// Result of waiting a bounded amount of time for a child to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited,
    StillRunning,
}

/// A live child process owned by the supervisor.
pub trait ManagedChild: Send {
    /// OS process id, if the process has not been reaped yet.
    fn id(&self) -> Option<u32>;

    /// Hand out the combined output pipe. Subsequent calls return `None`.
    fn take_output(&mut self) -> Option<OutputReader>;

    /// Ask the process to shut down (SIGTERM on Unix).
    fn terminate(&mut self) -> anyhow::Result<()>;

    /// Unconditionally kill the process (SIGKILL on Unix) and reap it.
    fn kill(&mut self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Wait up to `limit` for the process to exit.
    fn wait_exit(&mut self, limit: Duration) -> Pin<Box<dyn Future<Output = WaitOutcome> + Send + '_>>;

    /// Exit code of an exited process, without blocking.
    ///
    /// `None` while the process is running or the code cannot be read. A
    /// Unix signal death reports `128 + signal`.
    fn try_exit_code(&mut self) -> Option<i32>;
}

/// Trait abstracting how the supervised process gets spawned.
pub trait ProcessLauncher: Send + Sync {
    /// Spawn `argv[0]` with the remaining elements as arguments.
    ///
    /// Failures are reported as [`crate::errors::SupervisorError::LaunchError`].
    fn launch(&self, argv: &[String]) -> Result<Box<dyn ManagedChild>>;
}
