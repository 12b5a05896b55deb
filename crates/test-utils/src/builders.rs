#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use svckeeper::fs::mock::MockFileSystem;
use svckeeper::supervisor::SupervisorOptions;
use svckeeper::types::{RedeployPolicy, ServiceConfig};

pub const ARTIFACT_NAME: &str = "server";
pub const BUNDLE_DIR: &str = "/bundle";
pub const INSTALL_DIR: &str = "/app/bin";
pub const ARTIFACT_BYTES: &[u8] = b"#!/bin/sh\necho fake server\n";

/// Builder for `ServiceConfig` to simplify test setup.
///
/// Starts from the stock settings: host `0.0.0.0`, port `9501`, no
/// credential, storage under `/data`.
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ServiceConfig {
                host: Some("0.0.0.0".to_string()),
                port: Some("9501".to_string()),
                auth_token: None,
                storage_path: PathBuf::from("/data/cc"),
                history_file_path: PathBuf::from("/data/h.json"),
            },
        }
    }

    pub fn host(mut self, host: Option<&str>) -> Self {
        self.config.host = host.map(str::to_string);
        self
    }

    pub fn port(mut self, port: Option<&str>) -> Self {
        self.config.port = port.map(str::to_string);
        self
    }

    pub fn auth(mut self, auth: Option<&str>) -> Self {
        self.config.auth_token = auth.map(str::to_string);
        self
    }

    pub fn storage(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_path = path.into();
        self
    }

    pub fn history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.history_file_path = path.into();
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `SupervisorOptions`, defaulting to the paths used by
/// [`mock_fs_with_artifact`].
pub struct SupervisorOptionsBuilder {
    options: SupervisorOptions,
}

impl SupervisorOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: SupervisorOptions {
                artifact_name: ARTIFACT_NAME.to_string(),
                bundle_dir: PathBuf::from(BUNDLE_DIR),
                install_dir: PathBuf::from(INSTALL_DIR),
                redeploy: RedeployPolicy::IfMissing,
                stop_timeout: Duration::from_secs(5),
                exit_wait: Duration::from_secs(2),
            },
        }
    }

    pub fn artifact_name(mut self, name: &str) -> Self {
        self.options.artifact_name = name.to_string();
        self
    }

    pub fn bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.bundle_dir = dir.into();
        self
    }

    pub fn install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.install_dir = dir.into();
        self
    }

    pub fn redeploy(mut self, policy: RedeployPolicy) -> Self {
        self.options.redeploy = policy;
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.options.stop_timeout = timeout;
        self
    }

    pub fn exit_wait(mut self, wait: Duration) -> Self {
        self.options.exit_wait = wait;
        self
    }

    pub fn build(self) -> SupervisorOptions {
        self.options
    }
}

impl Default for SupervisorOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory filesystem holding the bundled artifact at
/// `/bundle/server`.
pub fn mock_fs_with_artifact() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file(PathBuf::from(BUNDLE_DIR).join(ARTIFACT_NAME), ARTIFACT_BYTES);
    fs
}
