// src/config/validate.rs

//! Settings validation.
//!
//! Only existence checks: the values themselves (host, port, credential)
//! are the child's business.

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile, SupervisorSection};
use crate::errors::{Result, SupervisorError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SupervisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_artifact(&raw)?;
        validate_storage(&raw)?;
        let supervisor = validate_supervisor(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.service,
            raw.artifact,
            raw.storage,
            supervisor,
        ))
    }
}

fn validate_artifact(cfg: &RawConfigFile) -> Result<()> {
    if cfg.artifact.name.trim().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[artifact].name must not be empty".to_string(),
        ));
    }
    if cfg.artifact.bundle_dir.as_os_str().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[artifact].bundle_dir must not be empty".to_string(),
        ));
    }
    if cfg.artifact.install_dir.as_os_str().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[artifact].install_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_storage(cfg: &RawConfigFile) -> Result<()> {
    if cfg.storage.storage_path.as_os_str().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[storage].storage_path must not be empty".to_string(),
        ));
    }
    if cfg.storage.history_file.as_os_str().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[storage].history_file must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_supervisor(cfg: &RawConfigFile) -> Result<SupervisorSection> {
    let stop_timeout = parse_duration(&cfg.supervisor.stop_timeout).map_err(|e| {
        SupervisorError::ConfigError(format!("[supervisor].stop_timeout: {e}"))
    })?;
    let exit_wait = parse_duration(&cfg.supervisor.exit_wait)
        .map_err(|e| SupervisorError::ConfigError(format!("[supervisor].exit_wait: {e}")))?;

    Ok(SupervisorSection {
        stop_timeout,
        exit_wait,
    })
}

/// Parse a simple duration string like `"5s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| "duration out of range".to_string())
}
