// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a settings file and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] for
/// the checked version.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a settings file, validate it and resolve its relative paths against
/// the file's directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config.with_root(&config_root_dir(path)))
}

/// Like [`load_and_validate`], but a missing file yields the defaults
/// (resolved against the directory the file would live in).
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if path.exists() {
        return load_and_validate(path);
    }

    warn!(path = ?path, "settings file not found; using defaults");
    let config = ConfigFile::try_from(RawConfigFile::default())?;
    Ok(config.with_root(&config_root_dir(path)))
}

/// Directory relative settings paths are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "conf/Svckeeper.toml"),
///   that directory is used.
/// - For a bare filename like "Svckeeper.toml" the current working
///   directory is used.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
