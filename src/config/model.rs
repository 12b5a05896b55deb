// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::supervisor::SupervisorOptions;
use crate::types::{RedeployPolicy, ServiceConfig};

/// Settings file as read from TOML, before validation.
///
/// ```toml
/// [service]
/// host = "0.0.0.0"
/// port = "9501"
/// auth = ""
///
/// [artifact]
/// name = "cloudclip_android_arm64"
/// bundle_dir = "assets"
/// install_dir = "bin"
/// redeploy = "if-missing"
///
/// [storage]
/// storage_path = "data/clipboard_data"
/// history_file = "data/history.json"
///
/// [supervisor]
/// stop_timeout = "5s"
/// exit_wait = "2s"
/// ```
///
/// Every section and field is optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub artifact: ArtifactSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub supervisor: RawSupervisorSection,
}

/// `[service]`: values passed to the child on its command line.
///
/// Kept as plain strings; blank values are simply not passed.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default)]
    pub auth: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> String {
    "9501".to_string()
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth: String::new(),
        }
    }
}

/// `[artifact]`: the bundled executable and where it gets installed.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactSection {
    #[serde(default = "default_artifact_name")]
    pub name: String,

    /// Read-only directory the artifact ships in.
    #[serde(default = "default_bundle_dir")]
    pub bundle_dir: PathBuf,

    /// Writable directory the artifact is copied to and run from.
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    #[serde(default)]
    pub redeploy: RedeployPolicy,
}

fn default_artifact_name() -> String {
    "cloudclip_android_arm64".to_string()
}

fn default_bundle_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_install_dir() -> PathBuf {
    PathBuf::from("bin")
}

impl Default for ArtifactSection {
    fn default() -> Self {
        Self {
            name: default_artifact_name(),
            bundle_dir: default_bundle_dir(),
            install_dir: default_install_dir(),
            redeploy: RedeployPolicy::default(),
        }
    }
}

/// `[storage]`: paths handed through to the child verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/clipboard_data")
}

fn default_history_file() -> PathBuf {
    PathBuf::from("data/history.json")
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            history_file: default_history_file(),
        }
    }
}

/// `[supervisor]` as written in the file: durations are strings like `"5s"`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSupervisorSection {
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: String,

    #[serde(default = "default_exit_wait")]
    pub exit_wait: String,
}

fn default_stop_timeout() -> String {
    "5s".to_string()
}

fn default_exit_wait() -> String {
    "2s".to_string()
}

impl Default for RawSupervisorSection {
    fn default() -> Self {
        Self {
            stop_timeout: default_stop_timeout(),
            exit_wait: default_exit_wait(),
        }
    }
}

/// `[supervisor]` after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSection {
    /// Grace period between SIGTERM and SIGKILL.
    pub stop_timeout: Duration,
    /// Bounded wait for the exit code after the child's output closed.
    pub exit_wait: Duration,
}

/// Validated settings. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub service: ServiceSection,
    pub artifact: ArtifactSection,
    pub storage: StorageSection,
    pub supervisor: SupervisorSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        service: ServiceSection,
        artifact: ArtifactSection,
        storage: StorageSection,
        supervisor: SupervisorSection,
    ) -> Self {
        Self {
            service,
            artifact,
            storage,
            supervisor,
        }
    }

    /// Resolve every relative path against `root` (normally the directory
    /// holding the settings file).
    pub fn with_root(mut self, root: &Path) -> Self {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        resolve(&mut self.artifact.bundle_dir);
        resolve(&mut self.artifact.install_dir);
        resolve(&mut self.storage.storage_path);
        resolve(&mut self.storage.history_file);
        self
    }

    /// Fresh snapshot for one start request.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            host: Some(self.service.host.clone()),
            port: Some(self.service.port.clone()),
            auth_token: Some(self.service.auth.clone()),
            storage_path: self.storage.storage_path.clone(),
            history_file_path: self.storage.history_file.clone(),
        }
    }

    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            artifact_name: self.artifact.name.clone(),
            bundle_dir: self.artifact.bundle_dir.clone(),
            install_dir: self.artifact.install_dir.clone(),
            redeploy: self.artifact.redeploy,
            stop_timeout: self.supervisor.stop_timeout,
            exit_wait: self.supervisor.exit_wait,
        }
    }
}
