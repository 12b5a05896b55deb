use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Lifecycle of the supervised child as seen by the supervisor.
///
/// Legal edges:
///
/// ```text
/// Stopped -> Starting -> Running -> Stopping -> Stopped
///            Starting ------------------------> Stopped   (deploy/launch failure)
///                        Running -------------> Stopped   (child exited on its own)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl LifecycleState {
    /// `start` is refused in these states.
    pub fn is_busy(self) -> bool {
        matches!(self, LifecycleState::Starting | LifecycleState::Running)
    }

    /// A live process handle must exist in these states.
    pub fn has_process(self) -> bool {
        matches!(self, LifecycleState::Running | LifecycleState::Stopping)
    }

    /// Whether `self -> to` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Running, Stopped)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Immutable snapshot of the settings used for a single start request.
///
/// Optional fields that are `None` or blank are left off the command line
/// entirely; see [`crate::command::build_argv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub host: Option<String>,
    pub port: Option<String>,
    pub auth_token: Option<String>,
    pub storage_path: PathBuf,
    pub history_file_path: PathBuf,
}

/// When an already-installed artifact gets replaced by the bundled copy.
///
/// - `IfMissing`: only copy when nothing exists at the install path
///   (default).
/// - `IfChanged`: also copy when the installed file's blake3 digest differs
///   from the bundled one.
/// - `Always`: copy on every start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RedeployPolicy {
    #[default]
    IfMissing,
    IfChanged,
    Always,
}

impl FromStr for RedeployPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "if-missing" => Ok(RedeployPolicy::IfMissing),
            "if-changed" => Ok(RedeployPolicy::IfChanged),
            "always" => Ok(RedeployPolicy::Always),
            other => Err(format!(
                "invalid redeploy policy: {other} (expected \"if-missing\", \"if-changed\" or \"always\")"
            )),
        }
    }
}
