use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::watch;
use tokio::time::Instant;

use svckeeper::errors::{Result, SupervisorError};
use svckeeper::exec::{ManagedChild, OutputReader, ProcessLauncher, WaitOutcome};

const PIPE_CAPACITY: usize = 64 * 1024;
const FIRST_PID: u32 = 4000;

/// How a fake process reacts to the cooperative termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TermBehaviour {
    /// Exit with code 0 and close the output pipe.
    #[default]
    Honour,
    /// Keep running until killed.
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FakeExit {
    Running,
    Exited(Option<i32>),
}

struct Shared {
    argv: Vec<String>,
    pid: u32,
    behaviour: TermBehaviour,
    // Output stays open after exit, as if a grandchild still held it.
    lingering_output: bool,
    // Writer half shared by "stdout" and "stderr"; the supervisor reads
    // the other end.
    output: Mutex<Option<DuplexStream>>,
    exit: watch::Sender<FakeExit>,
    terminate_calls: AtomicUsize,
    kill_calls: AtomicUsize,
    terminated_at: Mutex<Option<Instant>>,
    killed_at: Mutex<Option<Instant>>,
}

impl Shared {
    fn close_output(&self) {
        drop(self.output.lock().unwrap().take());
    }

    fn finish(&self, code: Option<i32>) {
        if !self.lingering_output {
            self.close_output();
        }
        self.exit.send_replace(FakeExit::Exited(code));
    }

    fn exited(&self) -> bool {
        matches!(*self.exit.borrow(), FakeExit::Exited(_))
    }
}

/// Test-side view of a process handed out by [`FakeLauncher`].
#[derive(Clone)]
pub struct FakeProcess {
    shared: Arc<Shared>,
}

impl FakeProcess {
    pub fn argv(&self) -> Vec<String> {
        self.shared.argv.clone()
    }

    pub fn pid(&self) -> u32 {
        self.shared.pid
    }

    /// Write raw bytes to the child's stdout.
    pub async fn write_stdout(&self, bytes: &[u8]) {
        assert!(self.try_write(bytes).await, "fake output pipe closed");
    }

    /// Write raw bytes to the child's stderr. It shares the stdout pipe,
    /// like a real child's `2>&1`.
    pub async fn write_stderr(&self, bytes: &[u8]) {
        assert!(self.try_write(bytes).await, "fake output pipe closed");
    }

    /// Write to the output pipe; `false` when this side closed it or the
    /// supervisor dropped the read end.
    pub async fn try_write(&self, bytes: &[u8]) -> bool {
        let taken = self.shared.output.lock().unwrap().take();
        let Some(mut pipe) = taken else {
            return false;
        };
        let written = pipe.write_all(bytes).await.is_ok();
        *self.shared.output.lock().unwrap() = Some(pipe);
        written
    }

    /// Close the output pipe without exiting.
    pub fn close_output(&self) {
        self.shared.close_output();
    }

    /// Exit on its own with `code`, closing the output pipe.
    pub fn exit(&self, code: i32) {
        self.shared.finish(Some(code));
    }

    pub fn has_exited(&self) -> bool {
        self.shared.exited()
    }

    pub fn terminate_calls(&self) -> usize {
        self.shared.terminate_calls.load(Ordering::SeqCst)
    }

    pub fn kill_calls(&self) -> usize {
        self.shared.kill_calls.load(Ordering::SeqCst)
    }

    pub fn terminated_at(&self) -> Option<Instant> {
        *self.shared.terminated_at.lock().unwrap()
    }

    pub fn killed_at(&self) -> Option<Instant> {
        *self.shared.killed_at.lock().unwrap()
    }
}

async fn wait_exited(mut rx: watch::Receiver<FakeExit>) -> bool {
    loop {
        if matches!(*rx.borrow_and_update(), FakeExit::Exited(_)) {
            return true;
        }
        if rx.changed().await.is_err() {
            return false;
        }
    }
}

/// Supervisor-side handle of a fake process.
struct FakeChild {
    shared: Arc<Shared>,
    output: Option<DuplexStream>,
}

impl ManagedChild for FakeChild {
    fn id(&self) -> Option<u32> {
        if self.shared.exited() {
            None
        } else {
            Some(self.shared.pid)
        }
    }

    fn take_output(&mut self) -> Option<OutputReader> {
        self.output.take().map(|s| Box::new(s) as OutputReader)
    }

    fn terminate(&mut self) -> anyhow::Result<()> {
        self.shared.terminate_calls.fetch_add(1, Ordering::SeqCst);
        *self.shared.terminated_at.lock().unwrap() = Some(Instant::now());
        if self.shared.behaviour == TermBehaviour::Honour && !self.shared.exited() {
            self.shared.finish(Some(0));
        }
        Ok(())
    }

    fn kill(&mut self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.shared.kill_calls.fetch_add(1, Ordering::SeqCst);
            *self.shared.killed_at.lock().unwrap() = Some(Instant::now());
            if !self.shared.exited() {
                self.shared.finish(None);
            }
            Ok(())
        })
    }

    fn wait_exit(&mut self, limit: Duration) -> Pin<Box<dyn Future<Output = WaitOutcome> + Send + '_>> {
        let rx = self.shared.exit.subscribe();
        Box::pin(async move {
            match tokio::time::timeout(limit, wait_exited(rx)).await {
                Ok(true) => WaitOutcome::Exited,
                _ => WaitOutcome::StillRunning,
            }
        })
    }

    fn try_exit_code(&mut self) -> Option<i32> {
        match *self.shared.exit.borrow() {
            FakeExit::Exited(code) => code,
            FakeExit::Running => None,
        }
    }
}

#[derive(Default)]
struct LauncherState {
    behaviour: TermBehaviour,
    lingering_output: bool,
    fail_with: Option<String>,
    attempts: usize,
    processes: Vec<FakeProcess>,
}

/// A launcher that:
/// - records every launch attempt
/// - hands out scripted in-memory processes instead of spawning anything.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<LauncherState>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes launched from now on ignore the cooperative signal.
    pub fn ignoring_sigterm() -> Self {
        let launcher = Self::default();
        launcher.state.lock().unwrap().behaviour = TermBehaviour::Ignore;
        launcher
    }

    /// Processes launched from now on keep their output pipe open after
    /// they exit.
    pub fn lingering_output() -> Self {
        let launcher = Self::default();
        launcher.state.lock().unwrap().lingering_output = true;
        launcher
    }

    /// Every launch fails with `reason`.
    pub fn failing(reason: &str) -> Self {
        let launcher = Self::default();
        launcher.state.lock().unwrap().fail_with = Some(reason.to_string());
        launcher
    }

    /// Launch calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }

    /// Processes actually handed out.
    pub fn launch_count(&self) -> usize {
        self.state.lock().unwrap().processes.len()
    }

    pub fn process(&self, index: usize) -> FakeProcess {
        self.state.lock().unwrap().processes[index].clone()
    }

    pub fn last_process(&self) -> Option<FakeProcess> {
        self.state.lock().unwrap().processes.last().cloned()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, argv: &[String]) -> Result<Box<dyn ManagedChild>> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if let Some(reason) = &state.fail_with {
            return Err(SupervisorError::LaunchError(reason.clone()));
        }

        let (output_w, output_r) = tokio::io::duplex(PIPE_CAPACITY);
        let (exit, _) = watch::channel(FakeExit::Running);

        let shared = Arc::new(Shared {
            argv: argv.to_vec(),
            pid: FIRST_PID + state.processes.len() as u32,
            behaviour: state.behaviour,
            lingering_output: state.lingering_output,
            output: Mutex::new(Some(output_w)),
            exit,
            terminate_calls: AtomicUsize::new(0),
            kill_calls: AtomicUsize::new(0),
            terminated_at: Mutex::new(None),
            killed_at: Mutex::new(None),
        });

        state.processes.push(FakeProcess {
            shared: Arc::clone(&shared),
        });

        Ok(Box::new(FakeChild {
            shared,
            output: Some(output_r),
        }))
    }
}
