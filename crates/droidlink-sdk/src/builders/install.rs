//! Artifact installation into `jniLibs`.
//!
//! Every ABI folder of a target receives an entry named `lib<name>.so` that
//! refers to the freshly built artifact. The entry is either a symbolic link
//! to the artifact's absolute path or a full copy (see [`InstallMode`]).
//!
//! Entries are written under a temporary sibling name and renamed over the
//! destination, so an interrupted run never leaves a half-written library
//! behind and re-running replaces the entry in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::common::library_file_name;
use crate::catalog::TargetDescriptor;
use crate::types::{InstallError, InstallMode, InstalledArtifact};

/// Places built libraries into a project's `jniLibs` tree.
#[derive(Debug, Clone)]
pub struct Installer {
    /// `<project>/<jni_libs_dir>`
    jni_libs_root: PathBuf,
    library_file_name: String,
    mode: InstallMode,
}

impl Installer {
    /// Creates an installer for `<project_root>/<jni_libs_dir>`.
    pub fn new(
        project_root: &Path,
        jni_libs_dir: &Path,
        library_name: &str,
        mode: InstallMode,
    ) -> Self {
        Self {
            jni_libs_root: project_root.join(jni_libs_dir),
            library_file_name: library_file_name(library_name),
            mode,
        }
    }

    pub fn mode(&self) -> InstallMode {
        self.mode
    }

    /// Destination path of the library inside one ABI folder.
    pub fn destination(&self, folder: &str) -> PathBuf {
        self.jni_libs_root.join(folder).join(&self.library_file_name)
    }

    /// Installs `artifact` into every output folder of `descriptor`.
    ///
    /// Stops at the first failing folder.
    ///
    /// # Returns
    ///
    /// The destinations written, in output-folder order.
    pub fn install(
        &self,
        descriptor: &TargetDescriptor,
        artifact: &Path,
    ) -> Result<InstalledArtifact, InstallError> {
        let artifact = std::path::absolute(artifact).map_err(|source| {
            InstallError::LinkOrCopyFailed {
                triple: descriptor.triple,
                destination: self.jni_libs_root.clone(),
                artifact: artifact.to_path_buf(),
                source,
            }
        })?;

        let mut destinations = Vec::with_capacity(descriptor.output_folders.len());
        for folder in descriptor.output_folders {
            let dir = self.jni_libs_root.join(folder);
            ensure_dir(&dir).map_err(|source| InstallError::DirectoryCreateFailed {
                triple: descriptor.triple,
                path: dir.clone(),
                source,
            })?;

            let destination = dir.join(&self.library_file_name);
            place_atomically(self.mode, &artifact, &destination).map_err(|source| {
                InstallError::LinkOrCopyFailed {
                    triple: descriptor.triple,
                    destination: destination.clone(),
                    artifact: artifact.clone(),
                    source,
                }
            })?;

            info!(
                triple = descriptor.triple,
                mode = self.mode.as_str(),
                destination = %destination.display(),
                "installed library"
            );
            destinations.push(destination);
        }

        Ok(InstalledArtifact {
            triple: descriptor.triple,
            artifact,
            destinations,
        })
    }
}

/// Creates `dir` and its missing ancestors.
///
/// An existing directory is fine; anything else already at that path, or any
/// other failure, is an error.
fn ensure_dir(dir: &Path) -> io::Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Writes the link or copy under a temporary name, then renames it over `destination`.
fn place_atomically(mode: InstallMode, artifact: &Path, destination: &Path) -> io::Result<()> {
    let temp = temp_path(destination)?;

    match fs::remove_file(&temp) {
        Ok(()) => debug!(temp = %temp.display(), "removed stale temporary entry"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let written = match mode {
        InstallMode::Link => symlink_file(artifact, &temp),
        InstallMode::Copy => fs::copy(artifact, &temp).map(|_| ()),
    };

    if let Err(e) = written.and_then(|()| fs::rename(&temp, destination)) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    Ok(())
}

fn temp_path(destination: &Path) -> io::Result<PathBuf> {
    let file_name = destination.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", destination.display()),
        )
    })?;
    let temp_name = format!(
        ".{}.droidlink-tmp-{}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    Ok(destination.with_file_name(temp_name))
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink_file(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform; use install_mode = \"copy\"",
    ))
}
