use std::path::PathBuf;
use std::sync::Arc;

use svckeeper::deploy::hash::compute_file_hash;
use svckeeper::deploy::{ArtifactDeployer, COPY_BUFFER_SIZE};
use svckeeper::errors::SupervisorError;
use svckeeper::fs::FileSystem;
use svckeeper::fs::mock::MockFileSystem;
use svckeeper::types::RedeployPolicy;
use svckeeper_test_utils::builders::{
    mock_fs_with_artifact, ARTIFACT_BYTES, ARTIFACT_NAME, BUNDLE_DIR, INSTALL_DIR,
};

fn target() -> PathBuf {
    PathBuf::from(INSTALL_DIR).join(ARTIFACT_NAME)
}

fn source() -> PathBuf {
    PathBuf::from(BUNDLE_DIR).join(ARTIFACT_NAME)
}

fn deployer(fs: &MockFileSystem, policy: RedeployPolicy) -> ArtifactDeployer {
    ArtifactDeployer::new(Arc::new(fs.clone()), BUNDLE_DIR, policy)
}

#[test]
fn first_deploy_copies_and_marks_executable() {
    let fs = mock_fs_with_artifact();

    deployer(&fs, RedeployPolicy::IfMissing)
        .ensure_deployed(ARTIFACT_NAME, &target())
        .unwrap();

    assert_eq!(fs.contents(target()).unwrap(), ARTIFACT_BYTES);
    assert!(fs.is_executable(&target()));
    assert!(fs.is_dir(INSTALL_DIR));
    // The bundled copy is left alone.
    assert!(!fs.is_executable(&source()));
}

#[test]
fn if_missing_keeps_existing_install() {
    let fs = mock_fs_with_artifact();
    fs.add_file(target(), b"older build".to_vec());

    deployer(&fs, RedeployPolicy::IfMissing)
        .ensure_deployed(ARTIFACT_NAME, &target())
        .unwrap();

    assert_eq!(fs.create_count(target()), 0);
    assert_eq!(fs.contents(target()).unwrap(), b"older build");
    // Still made executable.
    assert!(fs.is_executable(&target()));
}

#[test]
fn repeated_deploys_copy_once_under_if_missing() {
    let fs = mock_fs_with_artifact();
    let deployer = deployer(&fs, RedeployPolicy::IfMissing);

    for _ in 0..3 {
        deployer.ensure_deployed(ARTIFACT_NAME, &target()).unwrap();
    }

    assert_eq!(fs.create_count(target()), 1);
}

#[test]
fn if_changed_replaces_stale_install() {
    let fs = mock_fs_with_artifact();
    fs.add_executable(target(), b"older build".to_vec());

    deployer(&fs, RedeployPolicy::IfChanged)
        .ensure_deployed(ARTIFACT_NAME, &target())
        .unwrap();

    assert_eq!(fs.create_count(target()), 1);
    assert_eq!(fs.contents(target()).unwrap(), ARTIFACT_BYTES);
    assert!(fs.is_executable(&target()));
}

#[test]
fn if_changed_skips_identical_install() {
    let fs = mock_fs_with_artifact();
    fs.add_executable(target(), ARTIFACT_BYTES.to_vec());

    deployer(&fs, RedeployPolicy::IfChanged)
        .ensure_deployed(ARTIFACT_NAME, &target())
        .unwrap();

    assert_eq!(fs.create_count(target()), 0);
}

#[test]
fn always_copies_on_every_call() {
    let fs = mock_fs_with_artifact();
    let deployer = deployer(&fs, RedeployPolicy::Always);

    deployer.ensure_deployed(ARTIFACT_NAME, &target()).unwrap();
    deployer.ensure_deployed(ARTIFACT_NAME, &target()).unwrap();

    assert_eq!(fs.create_count(target()), 2);
    assert_eq!(fs.contents(target()).unwrap(), ARTIFACT_BYTES);
}

#[test]
fn large_artifact_is_copied_completely() {
    let fs = MockFileSystem::new();
    let payload: Vec<u8> = (0..COPY_BUFFER_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
    fs.add_file(source(), payload.clone());

    deployer(&fs, RedeployPolicy::IfMissing)
        .ensure_deployed(ARTIFACT_NAME, &target())
        .unwrap();

    assert_eq!(fs.contents(target()).unwrap(), payload);
}

#[test]
fn missing_bundle_is_a_deploy_error() {
    let fs = MockFileSystem::new();

    let err = deployer(&fs, RedeployPolicy::IfMissing)
        .ensure_deployed(ARTIFACT_NAME, &target())
        .unwrap_err();

    match err {
        SupervisorError::DeployError(msg) => {
            assert!(msg.contains("opening bundled artifact"), "got: {msg}");
        }
        other => panic!("expected DeployError, got {other:?}"),
    }
    assert!(!fs.exists(&target()));
}

#[test]
fn read_failure_mid_copy_is_a_deploy_error() {
    let fs = MockFileSystem::new();
    fs.add_broken_file(source(), vec![7u8; 10_000], 5_000);

    let err = deployer(&fs, RedeployPolicy::IfMissing)
        .ensure_deployed(ARTIFACT_NAME, &target())
        .unwrap_err();

    assert!(matches!(err, SupervisorError::DeployError(ref m) if m.contains("reading bundled artifact")));
    // The partial copy stays behind and is never marked executable.
    assert_eq!(fs.contents(target()).unwrap().len(), 5_000);
    assert!(!fs.is_executable(&target()));
}

#[test]
fn permission_failure_is_a_deploy_error() {
    let fs = mock_fs_with_artifact();
    fs.lock_permissions(target());

    let err = deployer(&fs, RedeployPolicy::IfMissing)
        .ensure_deployed(ARTIFACT_NAME, &target())
        .unwrap_err();

    match err {
        SupervisorError::DeployError(msg) => {
            assert!(msg.contains("executable"), "got: {msg}");
            assert!(msg.contains("Permission denied"), "got: {msg}");
        }
        other => panic!("expected DeployError, got {other:?}"),
    }
}

#[test]
fn directory_in_the_way_is_a_deploy_error() {
    let fs = mock_fs_with_artifact();
    fs.create_dir_all(&target()).unwrap();

    let err = deployer(&fs, RedeployPolicy::IfMissing)
        .ensure_deployed(ARTIFACT_NAME, &target())
        .unwrap_err();

    assert!(matches!(err, SupervisorError::DeployError(_)));
}

#[test]
fn blake3_digest_of_known_content() {
    let fs = MockFileSystem::new();
    fs.add_file("test.txt", b"hello world".to_vec());

    let hash = compute_file_hash(&fs, &PathBuf::from("test.txt")).unwrap();

    assert_eq!(
        hash,
        "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
    );
}
