// src/deploy/mod.rs

//! Artifact deployment.
//!
//! The supervised server ships as a read-only bundled file. Before every
//! start the deployer makes sure a copy exists at a writable install path
//! and carries the executable bit:
//!
//! - [`ArtifactDeployer::ensure_deployed`] copies `<bundle_dir>/<name>` to
//!   the target when needed (see [`RedeployPolicy`]), then sets the
//!   executable bit if missing.
//! - [`hash`] holds the blake3 helper used by `RedeployPolicy::IfChanged`.
//!
//! A failed copy leaves whatever was written so far in place; the next start
//! attempt overwrites it only if the policy says so.

pub mod hash;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::errors::SupervisorError;
use crate::fs::FileSystem;
use crate::types::RedeployPolicy;

/// Size of the buffer used to stream the artifact into place.
pub const COPY_BUFFER_SIZE: usize = 4 * 1024;

#[derive(Debug, Clone)]
pub struct ArtifactDeployer {
    fs: Arc<dyn FileSystem>,
    bundle_dir: PathBuf,
    policy: RedeployPolicy,
}

impl ArtifactDeployer {
    pub fn new(fs: Arc<dyn FileSystem>, bundle_dir: impl Into<PathBuf>, policy: RedeployPolicy) -> Self {
        Self {
            fs,
            bundle_dir: bundle_dir.into(),
            policy,
        }
    }

    /// Path of the bundled (read-only) copy of `name`.
    pub fn source_path(&self, name: &str) -> PathBuf {
        self.bundle_dir.join(name)
    }

    /// Make sure `name` is installed at `target` and is executable.
    ///
    /// Every failure is reported as [`SupervisorError::DeployError`] with
    /// the underlying cause in the message.
    pub fn ensure_deployed(&self, name: &str, target: &Path) -> crate::errors::Result<()> {
        self.ensure_present(name, target)
            .map_err(SupervisorError::deploy)?;
        self.ensure_executable(target)
            .map_err(SupervisorError::deploy)?;
        Ok(())
    }

    fn ensure_present(&self, name: &str, target: &Path) -> Result<()> {
        let source = self.source_path(name);

        if self.fs.is_file(target) && !self.needs_refresh(&source, target)? {
            debug!(install_path = ?target, policy = ?self.policy, "artifact already installed");
            return Ok(());
        }

        let copied = self.copy_artifact(&source, target)?;
        info!(
            artifact = name,
            source = ?source,
            install_path = ?target,
            bytes = copied,
            "installed artifact"
        );
        Ok(())
    }

    fn needs_refresh(&self, source: &Path, target: &Path) -> Result<bool> {
        match self.policy {
            RedeployPolicy::IfMissing => Ok(false),
            RedeployPolicy::Always => Ok(true),
            RedeployPolicy::IfChanged => {
                let same = hash::same_contents(self.fs.as_ref(), source, target)
                    .context("comparing bundled and installed artifact")?;
                if !same {
                    debug!(install_path = ?target, "installed artifact differs from bundle");
                }
                Ok(!same)
            }
        }
    }

    /// Stream `source` into `target` through a fixed-size buffer.
    fn copy_artifact(&self, source: &Path, target: &Path) -> Result<u64> {
        let mut reader = self
            .fs
            .open_read(source)
            .with_context(|| format!("opening bundled artifact {:?}", source))?;
        let mut writer = self
            .fs
            .create(target)
            .with_context(|| format!("creating install target {:?}", target))?;

        let mut buf = [0u8; COPY_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = reader
                .read(&mut buf)
                .with_context(|| format!("reading bundled artifact {:?}", source))?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .with_context(|| format!("writing install target {:?}", target))?;
            total += n as u64;
        }
        writer
            .flush()
            .with_context(|| format!("flushing install target {:?}", target))?;

        Ok(total)
    }

    fn ensure_executable(&self, target: &Path) -> Result<()> {
        if !self.fs.exists(target) {
            anyhow::bail!("artifact missing after install: {:?}", target);
        }
        if self.fs.is_executable(target) {
            return Ok(());
        }
        self.fs
            .set_executable(target)
            .with_context(|| format!("marking {:?} executable", target))?;
        debug!(install_path = ?target, "set executable permission");
        Ok(())
    }
}
