//! CLI smoke tests for droidlink.
//!
//! End-to-end runs use shell scripts standing in for `rustup` and `cargo`,
//! wired in through the `[tools]` section of `droidlink.toml`.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn droidlink_cmd() -> Command {
    cargo_bin_cmd!("droidlink")
}

/// A crate directory with `droidlink.toml` and an empty Android project next to it.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(tools: &str) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("android")).unwrap();
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(
            dir.path().join("droidlink.toml"),
            format!(
                "[library]\nname = \"voxel\"\n\n[build]\njobs = 2\ntarget_dir = \"target\"\n\n{tools}"
            ),
        )
        .unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn android(&self) -> PathBuf {
        self.path().join("android")
    }

    fn jni_libs(&self) -> PathBuf {
        self.android().join("app/src/main/jniLibs")
    }

    fn cmd(&self) -> Command {
        let mut cmd = droidlink_cmd();
        cmd.current_dir(self.path()).arg(self.android());
        cmd
    }
}

// =============================================================================
// Arguments
// =============================================================================

#[test]
fn help_flag_works() {
    droidlink_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("--arch"));
}

#[test]
fn version_flag_works() {
    droidlink_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("droidlink"));
}

#[test]
fn missing_project_path_is_a_usage_error() {
    droidlink_cmd().assert().code(2);
}

#[test]
fn unknown_arch_is_a_usage_error() {
    let ws = Workspace::new("");
    ws.cmd()
        .args(["--arch", "mips"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown architecture 'mips'"));

    assert!(!ws.jni_libs().exists());
}

#[test]
fn nonexistent_project_path_fails() {
    let ws = Workspace::new("");
    droidlink_cmd()
        .current_dir(ws.path())
        .arg(ws.path().join("missing"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn dry_run_lists_steps_without_running_them() {
    let ws = Workspace::new("[tools]\nrustup = \"./bin/absent-rustup\"\ncargo = \"./bin/absent-cargo\"\n");
    ws.cmd()
        .args(["--arch", "x86_64", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("target add x86_64-linux-android"))
        .stdout(predicate::str::contains("--target x86_64-linux-android"))
        .stdout(predicate::str::contains("jniLibs/x86_64"));

    assert!(!ws.jni_libs().exists());
}

// =============================================================================
// End-to-end with stand-in tools
// =============================================================================

#[cfg(unix)]
mod end_to_end {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(ws: &Workspace, name: &str, body: &str) {
        let path = ws.path().join("bin").join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    const TOOLS: &str = "[tools]\nrustup = \"./bin/rustup\"\ncargo = \"./bin/cargo\"\n";

    const CARGO_OK: &str = r#"triple=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--target" ]; then triple="$2"; fi
  shift
done
mkdir -p "target/$triple/release"
printf 'ELF' > "target/$triple/release/libvoxel.so""#;

    #[test]
    fn all_targets_are_linked() {
        let ws = Workspace::new(TOOLS);
        script(&ws, "rustup", "exit 0");
        script(&ws, "cargo", CARGO_OK);

        ws.cmd()
            .assert()
            .success()
            .stdout(predicate::str::contains("4 target(s) installed"));

        for folder in ["arm64", "arm64-v8a", "arm", "armeabi", "armeabi-v7a", "x86", "x86_64"] {
            let entry = ws.jni_libs().join(folder).join("libvoxel.so");
            let meta = std::fs::symlink_metadata(&entry).unwrap();
            assert!(meta.file_type().is_symlink(), "{} is not a symlink", entry.display());
            assert!(std::fs::read_link(&entry).unwrap().is_absolute());
        }
    }

    #[test]
    fn copy_flag_places_regular_files() {
        let ws = Workspace::new(TOOLS);
        script(&ws, "rustup", "exit 0");
        script(&ws, "cargo", CARGO_OK);

        ws.cmd().args(["-a", "i686", "--copy"]).assert().success();

        let entry = ws.jni_libs().join("x86/libvoxel.so");
        assert!(std::fs::symlink_metadata(&entry).unwrap().is_file());
        assert_eq!(std::fs::read_to_string(entry).unwrap(), "ELF");
    }

    #[test]
    fn build_failure_installs_nothing() {
        let ws = Workspace::new(TOOLS);
        script(&ws, "rustup", "exit 0");
        script(&ws, "cargo", "echo 'error: could not compile `voxel`' >&2\nexit 101");

        ws.cmd()
            .args(["--arch", "aarch64"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("aarch64-linux-android"))
            .stderr(predicate::str::contains("No libraries were installed"))
            .stdout(predicate::str::contains("build failed"));

        assert!(!ws.jni_libs().exists());
    }

    #[test]
    fn provisioning_failure_exits_with_partial_status() {
        let ws = Workspace::new(TOOLS);
        script(
            &ws,
            "rustup",
            "if [ \"$3\" = \"i686-linux-android\" ]; then echo 'error: no such target' >&2; exit 1; fi\nexit 0",
        );
        script(&ws, "cargo", CARGO_OK);

        ws.cmd()
            .assert()
            .code(3)
            .stderr(predicate::str::contains("i686-linux-android"));

        assert!(ws.jni_libs().join("x86_64/libvoxel.so").exists());
        assert!(!ws.jni_libs().join("x86").exists());
    }
}
