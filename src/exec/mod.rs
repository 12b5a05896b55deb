// src/exec/mod.rs

//! Process execution layer.
//!
//! The supervisor never touches `tokio::process` directly; it talks to a
//! [`ProcessLauncher`] that hands back [`ManagedChild`] handles. This keeps
//! the lifecycle logic testable with fake processes.
//!
//! - [`backend`] defines the launcher / child traits and the types that cross
//!   that seam.
//! - [`process`] is the production implementation on top of
//!   `tokio::process::Command`.

pub mod backend;
pub mod process;

pub use backend::{ManagedChild, OutputReader, ProcessLauncher, WaitOutcome};
pub use process::TokioLauncher;

/// Exit code reported when the platform cannot supply one (killed by a
/// signal, wait failed, or the process did not exit in time).
pub const UNKNOWN_EXIT_CODE: i32 = -1;
