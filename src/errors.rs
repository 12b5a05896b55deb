// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Copying the bundled artifact or marking it executable failed.
    #[error("Deploy error: {0}")]
    DeployError(String),

    /// The OS refused to spawn the child process.
    #[error("Launch error: {0}")]
    LaunchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("supervisor control task is no longer running")]
    ControlClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SupervisorError {
    /// Wrap a helper-layer error as a deploy failure, keeping its whole
    /// context chain in the message.
    pub fn deploy(err: anyhow::Error) -> Self {
        SupervisorError::DeployError(format!("{err:#}"))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SupervisorError>;
