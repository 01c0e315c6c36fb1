//! Toolchain provisioning.
//!
//! Runs `rustup target add <triple>` for each target. rustup short-circuits
//! for targets that are already installed, so provisioning is idempotent.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use super::common::{DEFAULT_TIMEOUT, describe_command, run_command};
use crate::catalog::TargetDescriptor;
use crate::types::ProvisionError;

/// Installs Rust standard libraries for Android targets via rustup.
#[derive(Debug, Clone)]
pub struct Provisioner {
    /// rustup executable
    rustup: PathBuf,
    timeout: Duration,
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new("rustup")
    }
}

impl Provisioner {
    /// Creates a provisioner that invokes the given rustup executable.
    pub fn new(rustup: impl Into<PathBuf>) -> Self {
        Self {
            rustup: rustup.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-invocation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command that installs `descriptor`'s target.
    pub fn command(&self, descriptor: &TargetDescriptor) -> Command {
        let mut cmd = Command::new(&self.rustup);
        cmd.args(["target", "add", descriptor.triple]);
        cmd
    }

    /// Makes sure the toolchain can compile for `descriptor`.
    pub async fn ensure_installed(&self, descriptor: &TargetDescriptor) -> Result<(), ProvisionError> {
        let cmd = self.command(descriptor);
        info!(triple = descriptor.triple, command = %describe_command(&cmd), "provisioning toolchain");

        let output = run_command(cmd, self.timeout, None)
            .await
            .map_err(|source| ProvisionError {
                triple: descriptor.triple,
                source,
            })?;

        debug!(triple = descriptor.triple, stderr = %output.stderr.trim(), "toolchain ready");
        Ok(())
    }
}
