//! Core types for droidlink-sdk.
//!
//! - [`DroidlinkError`] - setup errors (selector, project layout, metadata)
//! - [`CommandError`] - failures of an external tool invocation
//! - [`ProvisionError`] / [`BuildError`] / [`InstallError`] - per-stage failures
//! - [`RunContext`] - everything a run needs, fixed at startup
//! - [`BuildOutcome`] / [`InstalledArtifact`] - per-target results

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::TargetDescriptor;

/// Errors raised while setting up a run, before any target is processed.
#[derive(Debug, thiserror::Error)]
pub enum DroidlinkError {
    /// The architecture selector is not one of the catalog's names.
    #[error("unknown architecture '{0}'. Expected one of: all, aarch64, armv7, i686, x86_64")]
    UnknownSelector(String),

    /// The consuming project root is missing or not a directory.
    #[error("invalid project path {}: {reason}", path.display())]
    InvalidProject { path: PathBuf, reason: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),

    /// A configuration value could not be used.
    #[error("configuration error: {0}. Check droidlink.toml or CLI flags")]
    Config(String),
}

/// Failure of a single external command (`rustup`, `cargo`, NDK check script).
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The process could not be started at all.
    #[error("failed to start `{command}`: {source}. Ensure the tool is installed and on PATH")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("`{command}` failed ({status})\n{stderr}")]
    Failed {
        command: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        status: String,
        stderr: String,
    },

    /// The process exceeded the configured timeout and was killed.
    #[error("`{command}` timed out after {}s and was killed", timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    /// The run was cancelled before this command started.
    #[error("`{command}` was not started because the run was cancelled")]
    Cancelled { command: String },

    /// The worker task running the command stopped without reporting a result.
    #[error("`{command}` did not report a result: {reason}")]
    WorkerFailed { command: String, reason: String },
}

impl CommandError {
    /// The command line this error refers to.
    pub fn command(&self) -> &str {
        match self {
            CommandError::Spawn { command, .. }
            | CommandError::Failed { command, .. }
            | CommandError::TimedOut { command, .. }
            | CommandError::Cancelled { command }
            | CommandError::WorkerFailed { command, .. } => command,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

/// Toolchain installation failed for one target.
///
/// Collected rather than propagated: the target is dropped from the build,
/// the other targets continue.
#[derive(Debug, thiserror::Error)]
#[error("could not install the toolchain for {triple}: {source}")]
pub struct ProvisionError {
    pub triple: &'static str,
    #[source]
    pub source: CommandError,
}

/// Building the library for one target failed. Fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The build command failed, timed out, or was cancelled.
    #[error("build failed for {triple}: {source}")]
    Command {
        triple: &'static str,
        #[source]
        source: CommandError,
    },

    /// The build command succeeded but the expected artifact is absent.
    #[error(
        "build for {triple} succeeded but no artifact exists at {}. Check the library name and crate-type = [\"cdylib\"]",
        path.display()
    )]
    MissingArtifact { triple: &'static str, path: PathBuf },

    /// The worker running a build stopped without producing a result.
    #[error("build worker failed: {0}")]
    Worker(String),
}

impl BuildError {
    pub fn triple(&self) -> Option<&'static str> {
        match self {
            BuildError::Command { triple, .. } | BuildError::MissingArtifact { triple, .. } => {
                Some(triple)
            }
            BuildError::Worker(_) => None,
        }
    }

    /// Exit code of the build tool, when it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BuildError::Command { source, .. } => source.exit_code(),
            _ => None,
        }
    }

    /// True when the build never started because a sibling failed first.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            BuildError::Command {
                source: CommandError::Cancelled { .. },
                ..
            }
        )
    }
}

/// Placing an artifact into a `jniLibs` folder failed. Fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The ABI folder could not be created (and does not already exist as a directory).
    #[error("could not create {} for {triple}: {source}", path.display())]
    DirectoryCreateFailed {
        triple: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The link or copy could not be written into place.
    #[error("could not place {} -> {} for {triple}: {source}", destination.display(), artifact.display())]
    LinkOrCopyFailed {
        triple: &'static str,
        destination: PathBuf,
        artifact: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    pub fn triple(&self) -> &'static str {
        match self {
            InstallError::DirectoryCreateFailed { triple, .. }
            | InstallError::LinkOrCopyFailed { triple, .. } => triple,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            InstallError::DirectoryCreateFailed { path, .. } => path,
            InstallError::LinkOrCopyFailed { destination, .. } => destination,
        }
    }
}

/// How an artifact is placed into each ABI folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// Symbolic link to the absolute artifact path. Default on Unix.
    Link,
    /// Full copy of the artifact. Default where symlinks are not generally available.
    Copy,
}

impl Default for InstallMode {
    fn default() -> Self {
        if cfg!(unix) {
            InstallMode::Link
        } else {
            InstallMode::Copy
        }
    }
}

impl InstallMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallMode::Link => "link",
            InstallMode::Copy => "copy",
        }
    }
}

/// Process-wide inputs for one run. Built once, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Root of the consuming Android project.
    pub project_root: PathBuf,
    /// `jniLibs` root relative to `project_root`.
    pub jni_libs_dir: PathBuf,
    /// Directory of the crate being compiled; `cargo` runs here.
    pub crate_dir: PathBuf,
    /// Cargo target directory holding `<triple>/release/` trees.
    pub build_root: PathBuf,
    /// Library base name, without `lib` prefix or extension.
    pub library_name: String,
    /// Cargo features enabled for every target build.
    pub features: Vec<String>,
    /// Targets requested for this run, in catalog order.
    pub targets: Vec<TargetDescriptor>,
}

impl RunContext {
    /// Absolute `jniLibs` root inside the project.
    pub fn jni_libs_root(&self) -> PathBuf {
        self.project_root.join(&self.jni_libs_dir)
    }

    /// File name of the compiled library on Android, e.g. `libvoxel.so`.
    pub fn library_file_name(&self) -> String {
        crate::builders::common::library_file_name(&self.library_name)
    }
}

/// Result of building one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub descriptor: TargetDescriptor,
    pub succeeded: bool,
    /// Path to the compiled library; present exactly when `succeeded`.
    pub artifact_path: Option<PathBuf>,
}

impl BuildOutcome {
    pub fn built(descriptor: TargetDescriptor, artifact_path: PathBuf) -> Self {
        Self {
            descriptor,
            succeeded: true,
            artifact_path: Some(artifact_path),
        }
    }

    pub fn failed(descriptor: TargetDescriptor) -> Self {
        Self {
            descriptor,
            succeeded: false,
            artifact_path: None,
        }
    }
}

/// An artifact placed into every ABI folder of its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledArtifact {
    pub triple: &'static str,
    pub artifact: PathBuf,
    /// One entry per output folder, in catalog order.
    pub destinations: Vec<PathBuf>,
}
