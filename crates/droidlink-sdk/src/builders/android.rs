//! Android build automation
//!
//! Compiles the library once per Android target with
//! `cargo build --release --lib --target <triple>` and locates the resulting
//! shared object in the cargo target directory.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::info;

use super::common::{CancelFlag, DEFAULT_TIMEOUT, describe_command, library_file_name, run_command};
use crate::catalog::TargetDescriptor;
use crate::types::BuildError;

/// Cargo feature the library uses to enable its Android entry points.
pub const DEFAULT_ANDROID_FEATURE: &str = "android-lib";

/// Android builder that compiles the library for one target at a time
pub struct AndroidBuilder {
    /// Directory of the crate being built; cargo runs here
    crate_dir: PathBuf,
    /// Cargo target directory (`<build_root>/<triple>/release/...`)
    build_root: PathBuf,
    /// Library base name, e.g. "voxel" for `libvoxel.so`
    library_name: String,
    /// Cargo features passed with `--features`
    features: Vec<String>,
    /// cargo executable
    cargo: PathBuf,
    /// Pass `--target-dir <build_root>` so cargo writes where the artifact is looked up
    explicit_target_dir: bool,
    timeout: Duration,
}

impl AndroidBuilder {
    /// Creates a new Android builder
    ///
    /// # Arguments
    ///
    /// * `crate_dir` - Directory containing the library's Cargo.toml
    /// * `build_root` - Cargo target directory the build writes into
    /// * `library_name` - Library base name (e.g., "voxel")
    pub fn new(
        crate_dir: impl Into<PathBuf>,
        build_root: impl Into<PathBuf>,
        library_name: impl Into<String>,
    ) -> Self {
        Self {
            crate_dir: crate_dir.into(),
            build_root: build_root.into(),
            library_name: library_name.into(),
            features: vec![DEFAULT_ANDROID_FEATURE.to_string()],
            cargo: PathBuf::from("cargo"),
            explicit_target_dir: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replaces the cargo features enabled for the build
    pub fn features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    /// Uses a different cargo executable
    pub fn cargo(mut self, cargo: impl Into<PathBuf>) -> Self {
        self.cargo = cargo.into();
        self
    }

    /// Makes cargo build into `build_root` instead of its own default
    pub fn explicit_target_dir(mut self, explicit: bool) -> Self {
        self.explicit_target_dir = explicit;
        self
    }

    /// Sets the per-build timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The build command for `descriptor`
    pub fn command(&self, descriptor: &TargetDescriptor) -> Command {
        let mut cmd = Command::new(&self.cargo);
        cmd.args(["build", "--release", "--lib"]);
        if !self.features.is_empty() {
            cmd.arg(format!("--features={}", self.features.join(",")));
        }
        cmd.args(["--target", descriptor.triple]);
        if self.explicit_target_dir {
            cmd.arg("--target-dir").arg(&self.build_root);
        }
        cmd.current_dir(&self.crate_dir);
        cmd
    }

    /// Where the build for `descriptor` leaves its shared library
    pub fn artifact_path(&self, descriptor: &TargetDescriptor) -> PathBuf {
        self.build_root
            .join(descriptor.triple)
            .join("release")
            .join(library_file_name(&self.library_name))
    }

    /// Builds the library for `descriptor`
    ///
    /// Does not start cargo if `cancel` is already set.
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - path to the compiled `lib<name>.so`
    /// * `Err(BuildError)` - cargo failed, timed out, was cancelled, or left no artifact
    pub async fn build(
        &self,
        descriptor: &TargetDescriptor,
        cancel: &CancelFlag,
    ) -> Result<PathBuf, BuildError> {
        let cmd = self.command(descriptor);
        info!(triple = descriptor.triple, command = %describe_command(&cmd), "building library");

        run_command(cmd, self.timeout, Some(cancel))
            .await
            .map_err(|source| BuildError::Command {
                triple: descriptor.triple,
                source,
            })?;

        let artifact = self.artifact_path(descriptor);
        if !artifact.is_file() {
            return Err(BuildError::MissingArtifact {
                triple: descriptor.triple,
                path: artifact,
            });
        }

        info!(triple = descriptor.triple, artifact = %artifact.display(), "library built");
        Ok(artifact)
    }
}
