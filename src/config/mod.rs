// src/config/mod.rs

//! Settings loading and validation for svckeeper.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a settings file from disk (`loader.rs`).
//! - Check that required values exist and durations parse (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path, load_or_default};
pub use model::{
    ArtifactSection, ConfigFile, RawConfigFile, RawSupervisorSection, ServiceSection,
    StorageSection, SupervisorSection,
};
pub use validate::parse_duration;
