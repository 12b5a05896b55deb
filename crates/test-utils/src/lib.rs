pub mod builders;
pub mod fake_launcher;

use std::sync::Once;
use std::time::Duration;

use svckeeper::supervisor::SupervisorEvent;
use svckeeper::types::LifecycleState;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Output is captured by the harness and shown for failing tests only.
/// Filter with `RUST_LOG`, e.g. `RUST_LOG=svckeeper=debug,child_output=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Fail the test instead of hanging when `f` takes longer than 10s.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(10), f)
        .await
        .expect("timed out after 10s")
}

/// Everything received on an event channel so far, without waiting.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<SupervisorEvent>) -> Vec<SupervisorEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

/// Only the `StateChanged` payloads, in order.
pub fn states(events: &[SupervisorEvent]) -> Vec<LifecycleState> {
    events
        .iter()
        .filter_map(|e| match e {
            SupervisorEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect()
}

/// Only the `Status` texts, in order.
pub fn statuses(events: &[SupervisorEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SupervisorEvent::Status(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

/// Only the `Log` lines, in order.
pub fn logs(events: &[SupervisorEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SupervisorEvent::Log(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

/// Receive events until one matches `pred`; returns everything received,
/// including the match.
pub async fn recv_until<P>(
    rx: &mut mpsc::UnboundedReceiver<SupervisorEvent>,
    mut pred: P,
) -> Vec<SupervisorEvent>
where
    P: FnMut(&SupervisorEvent) -> bool,
{
    let mut seen = Vec::new();
    while let Some(event) = rx.recv().await {
        let done = pred(&event);
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}
