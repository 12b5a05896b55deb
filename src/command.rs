// src/command.rs

//! Command-line construction for the supervised server.
//!
//! The emitted order is fixed:
//!
//! ```text
//! <exe> [-host=H] [-port=P] [-auth=A] -storage=<dir> -historyfile=<path>
//! ```
//!
//! `-storage` and `-historyfile` are always present; the other flags only
//! when their value is non-blank.

use std::path::Path;

use crate::types::ServiceConfig;

/// Placeholder shown instead of the credential in rendered commands.
pub const REDACTED: &str = "****";

const AUTH_FLAG: &str = "-auth=";

/// Build the argument vector (including the executable) for `config`.
pub fn build_argv(executable: &Path, config: &ServiceConfig) -> Vec<String> {
    let mut argv = vec![executable.to_string_lossy().into_owned()];

    if let Some(host) = non_blank(config.host.as_deref()) {
        argv.push(format!("-host={host}"));
    }
    if let Some(port) = non_blank(config.port.as_deref()) {
        argv.push(format!("-port={port}"));
    }
    if let Some(auth) = non_blank(config.auth_token.as_deref()) {
        argv.push(format!("{AUTH_FLAG}{auth}"));
    }

    argv.push(format!("-storage={}", config.storage_path.to_string_lossy()));
    argv.push(format!(
        "-historyfile={}",
        config.history_file_path.to_string_lossy()
    ));

    argv
}

/// Render `argv` as a single line for logs, hiding the credential.
pub fn display_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            if arg.starts_with(AUTH_FLAG) {
                format!("{AUTH_FLAG}{REDACTED}")
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
