// src/supervisor/control.rs

//! The supervisor's control task.
//!
//! Owns the only [`ManagedChild`] and the [`StateMachine`]. Commands are
//! handled one at a time, so a `stop` queued behind a `start` runs once that
//! start has finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::command::{build_argv, display_command};
use crate::deploy::ArtifactDeployer;
use crate::errors::{Result, SupervisorError};
use crate::exec::{ManagedChild, ProcessLauncher, UNKNOWN_EXIT_CODE, WaitOutcome};
use crate::fs::FileSystem;
use crate::types::{LifecycleState, ServiceConfig};

use super::relay::spawn_output_relay;
use super::state::{StateMachine, Transition};
use super::{ControlCommand, ControlOutcome, RELAY_DRAIN_TIMEOUT, SupervisorEvent, SupervisorOptions};

/// The live child plus the relay reading its output.
struct ActiveProcess {
    generation: u64,
    pid: Option<u32>,
    child: Box<dyn ManagedChild>,
    relay: JoinHandle<()>,
}

pub struct ControlLoop<L> {
    options: SupervisorOptions,
    fs: Arc<dyn FileSystem>,
    deployer: ArtifactDeployer,
    launcher: L,
    machine: StateMachine,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    state_tx: watch::Sender<LifecycleState>,
    commands: mpsc::WeakSender<ControlCommand>,
    active: Option<ActiveProcess>,
    next_generation: u64,
}

impl<L: ProcessLauncher> ControlLoop<L> {
    pub fn new(
        options: SupervisorOptions,
        fs: Arc<dyn FileSystem>,
        launcher: L,
        events: mpsc::UnboundedSender<SupervisorEvent>,
        state_tx: watch::Sender<LifecycleState>,
        commands: mpsc::WeakSender<ControlCommand>,
    ) -> Self {
        let deployer = ArtifactDeployer::new(Arc::clone(&fs), &options.bundle_dir, options.redeploy);
        Self {
            options,
            fs,
            deployer,
            launcher,
            machine: StateMachine::new(),
            events,
            state_tx,
            commands,
            active: None,
            next_generation: 1,
        }
    }

    /// Process commands until every handle is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<ControlCommand>) {
        info!(
            artifact = %self.options.artifact_name,
            "supervisor control loop started"
        );

        while let Some(command) = rx.recv().await {
            debug!(?command, state = %self.machine.state(), "control command received");
            match command {
                ControlCommand::Start { config, reply } => {
                    let outcome = self.handle_start(config).await;
                    let _ = reply.send(outcome);
                }
                ControlCommand::Stop { reply } => {
                    let outcome = self.handle_stop().await;
                    let _ = reply.send(outcome);
                }
                ControlCommand::OutputClosed { generation } => {
                    self.handle_output_closed(generation).await;
                }
            }
        }

        if let Some(mut active) = self.active.take() {
            warn!(pid = ?active.pid, "supervisor dropped while service running; killing it");
            if let Err(e) = active.child.kill().await {
                warn!(error = %e, "failed to kill child on supervisor shutdown");
            }
            active.relay.abort();
        }

        info!("supervisor control loop finished (all handles dropped)");
    }

    async fn handle_start(&mut self, config: ServiceConfig) -> ControlOutcome {
        if self.machine.state().is_busy() {
            debug!(state = %self.machine.state(), "start ignored; service already running");
            self.status("service is already running");
            return ControlOutcome::AlreadyRunning;
        }

        self.set_state(LifecycleState::Starting);
        self.status("preparing to start service");

        let executable = self.options.executable_path();
        let deploy = deploy_artifact(
            self.deployer.clone(),
            self.options.artifact_name.clone(),
            executable.clone(),
        );
        if let Err(err) = deploy.await {
            return self.fail_start(err);
        }

        self.ensure_storage_dir(&config.storage_path);

        let argv = build_argv(&executable, &config);
        let rendered = display_command(&argv);
        info!(cmd = %rendered, "launching service");
        self.status("starting service");
        self.log(format!("CMD: {rendered}"));

        let mut child = match self.launcher.launch(&argv) {
            Ok(child) => child,
            Err(err) => return self.fail_start(err),
        };

        let generation = self.next_generation;
        self.next_generation += 1;
        let pid = child.id();
        let output = child.take_output();

        self.set_state(LifecycleState::Running);
        self.status("service started");
        info!(?pid, generation, "service running");

        let relay = spawn_output_relay(
            generation,
            output,
            self.events.clone(),
            self.commands.clone(),
        );
        self.active = Some(ActiveProcess {
            generation,
            pid,
            child,
            relay,
        });

        ControlOutcome::Started { pid }
    }

    /// Best effort: the child may well create it itself.
    fn ensure_storage_dir(&self, dir: &Path) {
        if let Err(e) = self.fs.create_dir_all(dir) {
            warn!(dir = ?dir, error = %format!("{e:#}"), "could not create storage directory");
        }
    }

    fn fail_start(&mut self, err: SupervisorError) -> ControlOutcome {
        error!(error = %err, "service failed to start");
        self.active = None;
        self.set_state(LifecycleState::Stopped);
        let reason = err.to_string();
        self.status(format!("failed to start service: {reason}"));
        ControlOutcome::StartFailed { reason }
    }

    async fn handle_stop(&mut self) -> ControlOutcome {
        let Some(mut active) = self.active.take() else {
            debug!(state = %self.machine.state(), "stop ignored; service not running");
            self.status("service is not running");
            return ControlOutcome::NotRunning;
        };

        self.set_state(LifecycleState::Stopping);
        self.status("stopping service");
        info!(pid = ?active.pid, "sending termination signal");

        if let Err(e) = active.child.terminate() {
            warn!(error = %format!("{e:#}"), "cooperative termination failed");
        }

        let timeout = self.options.stop_timeout;
        let forced = match active.child.wait_exit(timeout).await {
            WaitOutcome::Exited => false,
            WaitOutcome::StillRunning => {
                warn!(
                    pid = ?active.pid,
                    timeout_ms = timeout.as_millis() as u64,
                    "service ignored termination signal; killing it"
                );
                self.status(format!(
                    "service did not stop within {}ms; forcing termination",
                    timeout.as_millis()
                ));
                if let Err(e) = active.child.kill().await {
                    warn!(error = %format!("{e:#}"), "forced termination failed");
                }
                true
            }
        };

        let exit_code = active.child.try_exit_code().unwrap_or(UNKNOWN_EXIT_CODE);
        // A closure report from the relay carries a generation that no
        // longer matches.
        finish_relay(active.relay, RELAY_DRAIN_TIMEOUT).await;
        drop(active.child);

        self.set_state(LifecycleState::Stopped);
        self.status(format!("service stopped, exit code {exit_code}"));
        info!(exit_code, forced, "service stopped");

        ControlOutcome::Stopped { exit_code, forced }
    }

    /// The child's output closed without a `stop`: it exited (or crashed).
    async fn handle_output_closed(&mut self, generation: u64) {
        let current = self.active.as_ref().map(|a| a.generation);
        if current != Some(generation) {
            debug!(generation, ?current, "output closed for a process no longer tracked");
            return;
        }
        let Some(mut active) = self.active.take() else {
            return;
        };

        let exit_code = match active.child.wait_exit(self.options.exit_wait).await {
            WaitOutcome::Exited => active.child.try_exit_code().unwrap_or(UNKNOWN_EXIT_CODE),
            WaitOutcome::StillRunning => {
                warn!(
                    pid = ?active.pid,
                    "service closed its output but has not exited; releasing it"
                );
                UNKNOWN_EXIT_CODE
            }
        };
        drop(active);

        self.set_state(LifecycleState::Stopped);
        self.status(format!("service stopped, exit code {exit_code}"));
        info!(exit_code, generation, "service exited on its own");
    }

    fn set_state(&mut self, to: LifecycleState) {
        match self.machine.transition(to) {
            Transition::Changed { from, to } => {
                debug!(%from, %to, "lifecycle transition");
                self.state_tx.send_replace(to);
                let _ = self.events.send(SupervisorEvent::StateChanged(to));
            }
            Transition::Unchanged => {}
            Transition::Rejected { from, to } => {
                error!(%from, %to, "illegal lifecycle transition rejected");
            }
        }
    }

    fn status(&self, message: impl Into<String>) {
        let _ = self.events.send(SupervisorEvent::Status(message.into()));
    }

    fn log(&self, line: String) {
        let _ = self.events.send(SupervisorEvent::Log(line));
    }
}

/// Let the relay forward what is left, then abort it if the pipe is still
/// open.
async fn finish_relay(mut relay: JoinHandle<()>, drain: Duration) {
    if tokio::time::timeout(drain, &mut relay).await.is_err() {
        debug!("output still open after the process exited; detaching relay");
        relay.abort();
        let _ = relay.await;
    }
}

/// Run the (blocking) deployment off the async workers.
async fn deploy_artifact(deployer: ArtifactDeployer, name: String, target: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || deployer.ensure_deployed(&name, &target))
        .await
        .map_err(|e| SupervisorError::DeployError(format!("deploy task failed: {e}")))?
}
