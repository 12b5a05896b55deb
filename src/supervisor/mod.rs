// src/supervisor/mod.rs

//! Process supervisor.
//!
//! One control task per supervisor owns the child-process slot and the
//! lifecycle state. Callers talk to it through a cloneable
//! [`SupervisorHandle`]; every `start` / `stop` is queued on the same channel,
//! so at most one control operation runs at a time.
//!
//! - [`state`] is the pure lifecycle state machine.
//! - [`control`] is the control task: deploy, launch, two-phase stop, and
//!   handling of the child exiting on its own.
//! - [`relay`] forwards the child's output as log events.
//!
//! Notifications reach the caller as [`SupervisorEvent`]s, in the order the
//! control task and relay observed them.

pub mod control;
pub mod relay;
pub mod state;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::errors::{Result, SupervisorError};
use crate::fs::FileSystem;
use crate::exec::ProcessLauncher;
use crate::types::{LifecycleState, RedeployPolicy, ServiceConfig};

use control::ControlLoop;

/// Grace period between the cooperative signal and the forced kill.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for an exit code once the child's output has closed.
pub const DEFAULT_EXIT_WAIT: Duration = Duration::from_secs(2);

/// Capacity of the control command queue.
const CONTROL_QUEUE_CAPACITY: usize = 32;

/// How long a stop lets the relay forward the last buffered lines before
/// aborting it. The pipe can outlive the child when a grandchild holds it.
pub const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Notification delivered to the collaborator driving the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Human-readable lifecycle text. Not meant to be parsed.
    Status(String),
    /// One line of the child's combined output.
    Log(String),
    /// Authoritative state change; use this, not the status text.
    StateChanged(LifecycleState),
}

/// Informational result of a control operation.
///
/// Failures are outcomes too: a failed start leaves the supervisor in
/// `Stopped` and reports `StartFailed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    Started { pid: Option<u32> },
    AlreadyRunning,
    StartFailed { reason: String },
    Stopped { exit_code: i32, forced: bool },
    NotRunning,
}

/// Static supervisor settings: where the artifact comes from and goes to,
/// and the shutdown timings.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub artifact_name: String,
    pub bundle_dir: PathBuf,
    pub install_dir: PathBuf,
    pub redeploy: RedeployPolicy,
    pub stop_timeout: Duration,
    pub exit_wait: Duration,
}

impl SupervisorOptions {
    /// Install path of the executable.
    pub fn executable_path(&self) -> PathBuf {
        self.install_dir.join(&self.artifact_name)
    }
}

/// Requests processed by the control task.
pub enum ControlCommand {
    Start {
        config: ServiceConfig,
        reply: oneshot::Sender<ControlOutcome>,
    },
    Stop {
        reply: oneshot::Sender<ControlOutcome>,
    },
    /// Sent by the relay once the output pipe of `generation` closed.
    OutputClosed { generation: u64 },
}

impl fmt::Debug for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Start { .. } => f.write_str("Start"),
            ControlCommand::Stop { .. } => f.write_str("Stop"),
            ControlCommand::OutputClosed { generation } => f
                .debug_struct("OutputClosed")
                .field("generation", generation)
                .finish(),
        }
    }
}

/// Cheap, cloneable handle to a running supervisor.
///
/// Dropping every handle shuts the control task down; a child that is
/// still running at that point is killed.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<ControlCommand>,
    state_rx: watch::Receiver<LifecycleState>,
}

impl SupervisorHandle {
    /// Deploy and launch the service with `config`.
    ///
    /// Returns once the child is running or the attempt failed. The only
    /// `Err` is [`SupervisorError::ControlClosed`].
    pub async fn start(&self, config: ServiceConfig) -> Result<ControlOutcome> {
        self.request(|reply| ControlCommand::Start { config, reply }).await
    }

    /// Stop the service: SIGTERM, wait, then SIGKILL if needed.
    pub async fn stop(&self) -> Result<ControlOutcome> {
        self.request(|reply| ControlCommand::Stop { reply }).await
    }

    /// Stop the service (if running) and release this handle.
    pub async fn shutdown(self) -> Result<ControlOutcome> {
        self.stop().await
    }

    pub fn state(&self) -> LifecycleState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state_rx.clone()
    }

    /// Wait until the supervisor reaches `target`.
    pub async fn wait_for_state(&self, target: LifecycleState) -> Result<()> {
        let mut rx = self.subscribe_state();
        loop {
            if *rx.borrow_and_update() == target {
                return Ok(());
            }
            rx.changed()
                .await
                .map_err(|_| SupervisorError::ControlClosed)?;
        }
    }

    async fn request<F>(&self, make: F) -> Result<ControlOutcome>
    where
        F: FnOnce(oneshot::Sender<ControlOutcome>) -> ControlCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SupervisorError::ControlClosed)?;
        reply_rx.await.map_err(|_| SupervisorError::ControlClosed)
    }
}

/// Spawn the control task.
///
/// Returns the handle used to drive it and the receiver on which every
/// [`SupervisorEvent`] is delivered.
pub fn spawn_supervisor<L>(
    options: SupervisorOptions,
    fs: Arc<dyn FileSystem>,
    launcher: L,
) -> (SupervisorHandle, mpsc::UnboundedReceiver<SupervisorEvent>)
where
    L: ProcessLauncher + 'static,
{
    let (tx, rx) = mpsc::channel::<ControlCommand>(CONTROL_QUEUE_CAPACITY);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(LifecycleState::Stopped);

    let control = ControlLoop::new(options, fs, launcher, events_tx, state_tx, tx.downgrade());
    tokio::spawn(control.run(rx));

    (SupervisorHandle { tx, state_rx }, events_rx)
}
