#![cfg(unix)]

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use common::*;
use svckeeper::exec::TokioLauncher;
use svckeeper::fs::{FileSystem, RealFileSystem};
use svckeeper::supervisor::{spawn_supervisor, ControlOutcome, SupervisorEvent, SupervisorOptions};
use svckeeper::types::{LifecycleState, ServiceConfig};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Lay out `<tmp>/bundle/server` with `script` and return matching options
/// and settings. The bundled copy is deliberately not executable.
fn layout(tmp: &TempDir, script: &str) -> (SupervisorOptions, ServiceConfig) {
    let bundle = tmp.path().join("bundle");
    fs::create_dir_all(&bundle).unwrap();
    fs::write(bundle.join("server"), script).unwrap();

    let options = SupervisorOptionsBuilder::new()
        .bundle_dir(&bundle)
        .install_dir(tmp.path().join("bin"))
        .stop_timeout(Duration::from_millis(300))
        .build();
    let config = ServiceConfigBuilder::new()
        .host(Some("127.0.0.1"))
        .storage(tmp.path().join("data/cc"))
        .history_file(tmp.path().join("data/h.json"))
        .build();
    (options, config)
}

#[tokio::test]
async fn script_output_and_exit_code_are_reported() -> TestResult {
    init_tracing();
    let tmp = TempDir::new()?;
    let (options, config) = layout(
        &tmp,
        "#!/bin/sh\necho \"args $1 $2\"\necho \"oops\" 1>&2\nexit 3\n",
    );
    let installed = options.executable_path();

    let (handle, mut events) =
        spawn_supervisor(options, Arc::new(RealFileSystem), TokioLauncher::new());

    let outcome = with_timeout(handle.start(config)).await?;
    assert!(matches!(outcome, ControlOutcome::Started { pid: Some(_) }));

    let seen = with_timeout(recv_until(&mut events, is_state(LifecycleState::Stopped))).await;
    let lines = logs(&seen);
    assert!(lines.contains(&"args -host=127.0.0.1 -port=9501".to_string()), "{lines:?}");
    assert!(lines.contains(&"oops".to_string()), "{lines:?}");

    let status = with_timeout(recv_until(&mut events, |e| matches!(e, SupervisorEvent::Status(_)))).await;
    assert_eq!(statuses(&status), vec!["service stopped, exit code 3"]);

    assert!(RealFileSystem.is_executable(&installed));
    assert!(tmp.path().join("data/cc").is_dir());
    Ok(())
}

#[tokio::test]
async fn sigterm_stops_a_cooperative_child() -> TestResult {
    init_tracing();
    let tmp = TempDir::new()?;
    let (options, config) = layout(&tmp, "#!/bin/sh\necho ready\nexec sleep 30\n");

    let (handle, mut events) =
        spawn_supervisor(options, Arc::new(RealFileSystem), TokioLauncher::new());
    with_timeout(handle.start(config)).await?;
    with_timeout(recv_until(&mut events, |e| *e == SupervisorEvent::Log("ready".into()))).await;

    let outcome = with_timeout(handle.stop()).await?;

    // Death by SIGTERM is reported the way a shell would: 128 + 15.
    assert_eq!(
        outcome,
        ControlOutcome::Stopped {
            exit_code: 143,
            forced: false
        }
    );
    assert_eq!(handle.state(), LifecycleState::Stopped);
    Ok(())
}

#[tokio::test]
async fn child_ignoring_sigterm_is_killed() -> TestResult {
    init_tracing();
    let tmp = TempDir::new()?;
    let (options, config) = layout(
        &tmp,
        "#!/bin/sh\ntrap '' TERM\necho ready\nexec sleep 30\n",
    );

    let (handle, mut events) =
        spawn_supervisor(options, Arc::new(RealFileSystem), TokioLauncher::new());
    with_timeout(handle.start(config)).await?;
    with_timeout(recv_until(&mut events, |e| *e == SupervisorEvent::Log("ready".into()))).await;

    let outcome = with_timeout(handle.stop()).await?;

    assert_eq!(
        outcome,
        ControlOutcome::Stopped {
            exit_code: 137,
            forced: true
        }
    );
    Ok(())
}

#[tokio::test]
async fn interleaved_stdout_and_stderr_keep_write_order() -> TestResult {
    init_tracing();
    let tmp = TempDir::new()?;
    let script = "#!/bin/sh\n\
        i=0\n\
        while [ $i -lt 200 ]; do\n\
          if [ $((i % 2)) -eq 0 ]; then echo \"line$i\"; else echo \"line$i\" 1>&2; fi\n\
          i=$((i + 1))\n\
        done\n";
    let (options, config) = layout(&tmp, script);

    let (handle, mut events) =
        spawn_supervisor(options, Arc::new(RealFileSystem), TokioLauncher::new());
    with_timeout(handle.start(config)).await?;

    let seen = with_timeout(recv_until(&mut events, is_state(LifecycleState::Stopped))).await;
    let lines: Vec<String> = logs(&seen)
        .into_iter()
        .filter(|l| l.starts_with("line"))
        .collect();
    let expected: Vec<String> = (0..200).map(|i| format!("line{i}")).collect();
    assert_eq!(lines, expected);
    Ok(())
}

#[tokio::test]
async fn children_run_in_the_configured_working_dir() -> TestResult {
    init_tracing();
    let tmp = TempDir::new()?;
    let work = tmp.path().join("work");
    fs::create_dir_all(&work)?;
    let (options, config) = layout(&tmp, "#!/bin/sh\npwd -P\n");

    let launcher = TokioLauncher::new().with_working_dir(work.clone());
    let (handle, mut events) = spawn_supervisor(options, Arc::new(RealFileSystem), launcher);
    with_timeout(handle.start(config)).await?;

    let seen = with_timeout(recv_until(&mut events, is_state(LifecycleState::Stopped))).await;
    let expected = work.canonicalize()?.to_string_lossy().into_owned();
    assert!(logs(&seen).contains(&expected), "{:?}", logs(&seen));
    Ok(())
}

#[tokio::test]
async fn missing_interpreter_is_a_launch_failure() -> TestResult {
    init_tracing();
    let tmp = TempDir::new()?;
    let (options, config) = layout(&tmp, "#!/definitely/not/a/shell\n");

    let (handle, _events) =
        spawn_supervisor(options, Arc::new(RealFileSystem), TokioLauncher::new());
    let outcome = with_timeout(handle.start(config)).await?;

    match outcome {
        ControlOutcome::StartFailed { reason } => {
            assert!(reason.starts_with("Launch error:"), "got: {reason}")
        }
        other => panic!("expected StartFailed, got {other:?}"),
    }
    assert_eq!(handle.state(), LifecycleState::Stopped);
    Ok(())
}

#[test]
fn installed_copy_keeps_bundle_contents() {
    let tmp = TempDir::new().unwrap();
    let (options, _) = layout(&tmp, "#!/bin/sh\nexit 0\n");
    let deployer = svckeeper::deploy::ArtifactDeployer::new(
        Arc::new(RealFileSystem),
        &options.bundle_dir,
        options.redeploy,
    );

    deployer
        .ensure_deployed(&options.artifact_name, &options.executable_path())
        .unwrap();

    let installed = fs::read_to_string(options.executable_path()).unwrap();
    assert_eq!(installed, "#!/bin/sh\nexit 0\n");
    assert!(!RealFileSystem.is_executable(Path::new(&options.bundle_dir).join("server").as_path()));
}
