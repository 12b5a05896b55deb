#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc;

use svckeeper::fs::mock::MockFileSystem;
use svckeeper::supervisor::{spawn_supervisor, SupervisorEvent, SupervisorHandle, SupervisorOptions};
use svckeeper_test_utils::fake_launcher::FakeLauncher;

pub use svckeeper_test_utils::builders::{
    mock_fs_with_artifact, ServiceConfigBuilder, SupervisorOptionsBuilder, ARTIFACT_BYTES,
    ARTIFACT_NAME, BUNDLE_DIR, INSTALL_DIR,
};
pub use svckeeper_test_utils::{
    drain_events, init_tracing, logs, recv_until, states, statuses, with_timeout,
};

/// A supervisor wired to an in-memory filesystem and a fake launcher.
pub struct FakeRig {
    pub handle: SupervisorHandle,
    pub events: mpsc::UnboundedReceiver<SupervisorEvent>,
    pub fs: MockFileSystem,
    pub launcher: FakeLauncher,
}

pub fn fake_rig(options: SupervisorOptions, fs: MockFileSystem, launcher: FakeLauncher) -> FakeRig {
    init_tracing();
    let (handle, events) = spawn_supervisor(options, Arc::new(fs.clone()), launcher.clone());
    FakeRig {
        handle,
        events,
        fs,
        launcher,
    }
}

/// Default rig: artifact present, children honour SIGTERM.
pub fn default_rig() -> FakeRig {
    fake_rig(
        SupervisorOptionsBuilder::new().build(),
        mock_fs_with_artifact(),
        FakeLauncher::new(),
    )
}

pub fn is_state(target: svckeeper::types::LifecycleState) -> impl FnMut(&SupervisorEvent) -> bool {
    move |event| *event == SupervisorEvent::StateChanged(target)
}
