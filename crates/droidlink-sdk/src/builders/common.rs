//! Common utilities shared by the provisioner, builder and installer.
//!
//! - **Command execution** - every external tool runs through [`run_command`],
//!   which applies the operator timeout and honours run cancellation
//! - **Project detection** - project root validation, cargo target directory
//!   lookup and package name discovery
//!
//! Error messages name the exact command line or path involved so that a
//! failed run can be reproduced by hand.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::types::{CommandError, DroidlinkError};

/// Default per-command timeout: long enough for a cold release build.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Cooperative cancellation shared between the workers of one stage.
///
/// Work that has not started its external command yet checks the flag and
/// bails out; commands already running are left to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Renders a command as a shell-like string for logs and error messages.
pub fn describe_command(cmd: &Command) -> String {
    let std_cmd = cmd.as_std();
    let mut parts = vec![std_cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(std_cmd.get_args().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Runs an external command with a timeout.
///
/// The command is not started if `cancel` is already set. A command that
/// outlives `timeout` is killed and reported as [`CommandError::TimedOut`].
///
/// # Arguments
/// * `cmd` - The command to execute
/// * `timeout` - Upper bound on the command's wall-clock time
/// * `cancel` - Optional run-wide cancellation flag
///
/// # Returns
/// Captured stdout/stderr on success, or a [`CommandError`] naming the command.
pub async fn run_command(
    mut cmd: Command,
    timeout: Duration,
    cancel: Option<&CancelFlag>,
) -> Result<CommandOutput, CommandError> {
    let command = describe_command(&cmd);

    if cancel.is_some_and(CancelFlag::is_cancelled) {
        debug!(%command, "skipping command, run cancelled");
        return Err(CommandError::Cancelled { command });
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(%command, timeout_secs = timeout.as_secs(), "spawning process");

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => return Err(CommandError::Spawn { command, source }),
        Err(_) => return Err(CommandError::TimedOut { command, timeout }),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        if !stdout.is_empty() {
            debug!(%command, stdout = %stdout, "command stdout");
        }
        return Err(CommandError::Failed {
            command,
            code: output.status.code(),
            status: output.status.to_string(),
            stderr: tail(&stderr, 20),
        });
    }

    if !stderr.is_empty() {
        debug!(%command, stderr = %stderr, "command stderr");
    }

    Ok(CommandOutput { stdout, stderr })
}

/// Keeps the last `lines` lines of tool output; cargo errors sit at the end.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// Android shared library file name for a library base name.
///
/// Cargo replaces `-` with `_` in library file names, so this does too.
pub fn library_file_name(library_name: &str) -> String {
    format!("lib{}.so", library_name.replace('-', "_"))
}

/// Validates that the consuming project root exists and is a directory.
pub fn validate_project_root(project_root: &Path) -> Result<(), DroidlinkError> {
    if !project_root.exists() {
        return Err(DroidlinkError::InvalidProject {
            path: project_root.to_path_buf(),
            reason: "path does not exist. Pass the root of the Android project".into(),
        });
    }

    if !project_root.is_dir() {
        return Err(DroidlinkError::InvalidProject {
            path: project_root.to_path_buf(),
            reason: "path is not a directory. Pass the root of the Android project".into(),
        });
    }

    Ok(())
}

/// Detects the Cargo target directory using `cargo metadata`.
///
/// Handles workspaces, where the target directory lives at the workspace
/// root rather than next to the crate. Falls back to `crate_dir/target`
/// (with a warning) when cargo cannot be queried.
pub fn get_cargo_target_dir(cargo: &Path, crate_dir: &Path) -> PathBuf {
    let fallback = crate_dir.join("target");

    let output = std::process::Command::new(cargo)
        .args(["metadata", "--format-version", "1", "--no-deps"])
        .current_dir(crate_dir)
        .stdin(Stdio::null())
        .output();

    let output = match output {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                status = %output.status,
                stderr = %tail(&stderr, 3),
                fallback = %fallback.display(),
                "cargo metadata failed, using fallback target directory"
            );
            return fallback;
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback = %fallback.display(),
                "could not run cargo metadata, using fallback target directory"
            );
            return fallback;
        }
    };

    match parse_target_directory(&output.stdout) {
        Some(dir) => dir,
        None => {
            tracing::warn!(
                fallback = %fallback.display(),
                "cargo metadata output has no target_directory, using fallback"
            );
            fallback
        }
    }
}

fn parse_target_directory(metadata: &[u8]) -> Option<PathBuf> {
    let value: serde_json::Value = serde_json::from_slice(metadata).ok()?;
    value
        .get("target_directory")?
        .as_str()
        .map(PathBuf::from)
}

/// Reads `[package].name` from a Cargo.toml file.
///
/// Returns `None` when the file is missing, unparsable, or a virtual
/// workspace manifest without a `[package]` table.
pub fn read_package_name(cargo_toml_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(cargo_toml_path).ok()?;
    let manifest: toml::Table = toml::from_str(&content).ok()?;
    manifest
        .get("package")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}
