use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use svckeeper::config::{load_and_validate, load_or_default, parse_duration, ConfigFile, RawConfigFile};
use svckeeper::errors::SupervisorError;
use svckeeper::types::RedeployPolicy;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("Svckeeper.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn missing_file_yields_defaults_rooted_at_its_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let cfg = load_or_default(&path).unwrap();

    assert_eq!(cfg.service.host, "0.0.0.0");
    assert_eq!(cfg.service.port, "9501");
    assert_eq!(cfg.service.auth, "");
    assert_eq!(cfg.artifact.redeploy, RedeployPolicy::IfMissing);
    assert_eq!(cfg.artifact.bundle_dir, dir.path().join("assets"));
    assert_eq!(cfg.artifact.install_dir, dir.path().join("bin"));
    assert_eq!(cfg.storage.history_file, dir.path().join("data/history.json"));
    assert_eq!(cfg.supervisor.stop_timeout, Duration::from_secs(5));
    assert_eq!(cfg.supervisor.exit_wait, Duration::from_secs(2));
}

#[test]
fn values_from_file_override_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[service]
port = "9600"
auth = "hunter2"

[artifact]
name = "server"
install_dir = "/opt/svc/bin"
redeploy = "if-changed"

[supervisor]
stop_timeout = "750ms"
"#,
    );

    let cfg = load_and_validate(&path).unwrap();

    assert_eq!(cfg.service.host, "0.0.0.0");
    assert_eq!(cfg.service.port, "9600");
    assert_eq!(cfg.artifact.redeploy, RedeployPolicy::IfChanged);
    // Absolute paths are kept, relative ones resolved against the file.
    assert_eq!(cfg.artifact.install_dir, PathBuf::from("/opt/svc/bin"));
    assert_eq!(cfg.artifact.bundle_dir, dir.path().join("assets"));
    assert_eq!(cfg.supervisor.stop_timeout, Duration::from_millis(750));

    let options = cfg.supervisor_options();
    assert_eq!(options.executable_path(), PathBuf::from("/opt/svc/bin/server"));

    let service = cfg.service_config();
    assert_eq!(service.auth_token.as_deref(), Some("hunter2"));
    assert_eq!(service.storage_path, dir.path().join("data/clipboard_data"));
}

#[test]
fn invalid_duration_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[supervisor]\nstop_timeout = \"soon\"\n");

    let err = load_and_validate(&path).unwrap_err();

    match err {
        SupervisorError::ConfigError(msg) => assert!(msg.contains("stop_timeout"), "got: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn empty_artifact_name_is_rejected() {
    let mut raw = RawConfigFile::default();
    raw.artifact.name = "  ".to_string();

    let err = ConfigFile::try_from(raw).unwrap_err();

    assert!(matches!(err, SupervisorError::ConfigError(_)));
}

#[test]
fn malformed_toml_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[service\nport = 1");

    let err = load_and_validate(&path).unwrap_err();

    assert!(matches!(err, SupervisorError::TomlError(_)));
}

#[test]
fn unknown_redeploy_policy_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[artifact]\nredeploy = \"sometimes\"\n");

    assert!(load_and_validate(&path).is_err());
}

#[test]
fn load_and_validate_requires_the_file() {
    let dir = TempDir::new().unwrap();

    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();

    assert!(matches!(err, SupervisorError::IoError(_)));
}

#[test]
fn parses_supported_duration_units() {
    assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration(" 5s ").unwrap(), Duration::from_secs(5));
    assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));

    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5d").is_err());
}

#[test]
fn oversized_durations_are_rejected_not_wrapped() {
    assert_eq!(
        parse_duration("18446744073709551615h"),
        Err("duration out of range".to_string())
    );
    assert_eq!(
        parse_duration("307445734561825861m"),
        Err("duration out of range".to_string())
    );
    assert_eq!(
        parse_duration("18446744073709551615s").unwrap(),
        Duration::from_secs(u64::MAX)
    );
}

#[test]
fn oversized_stop_timeout_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[supervisor]\nstop_timeout = \"18446744073709551615h\"\n");

    match load_and_validate(&path).unwrap_err() {
        SupervisorError::ConfigError(msg) => assert!(msg.contains("out of range"), "got: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn redeploy_policy_parses_from_cli_text() {
    assert_eq!("always".parse::<RedeployPolicy>().unwrap(), RedeployPolicy::Always);
    assert_eq!("If-Changed".parse::<RedeployPolicy>().unwrap(), RedeployPolicy::IfChanged);
    assert!("never".parse::<RedeployPolicy>().is_err());
}
