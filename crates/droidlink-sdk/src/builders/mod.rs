//! Per-target build steps.
//!
//! Each stage of the pipeline has its own builder type:
//!
//! | Type | Stage | External tool |
//! |------|-------|---------------|
//! | [`Provisioner`] | toolchain provisioning | `rustup target add` |
//! | [`AndroidBuilder`] | library compilation | `cargo build --release --lib` |
//! | [`Installer`] | placement into `jniLibs` | none (filesystem only) |
//!
//! The `common` module provides command execution with timeouts and
//! cancellation, plus project detection helpers.
//!
//! ## Example
//!
//! ```ignore
//! use droidlink_sdk::builders::{AndroidBuilder, Installer, Provisioner};
//! use droidlink_sdk::builders::common::CancelFlag;
//! use droidlink_sdk::catalog::Arch;
//! use droidlink_sdk::InstallMode;
//! use std::path::Path;
//!
//! let target = Arch::Aarch64.descriptor();
//! Provisioner::default().ensure_installed(&target).await?;
//!
//! let artifact = AndroidBuilder::new(".", "target", "voxel")
//!     .build(&target, &CancelFlag::new())
//!     .await?;
//!
//! Installer::new(Path::new("../app"), Path::new("app/src/main/jniLibs"), "voxel", InstallMode::Link)
//!     .install(&target, &artifact)?;
//! ```

pub mod android;
pub mod common;
pub mod install;
pub mod toolchain;

pub use android::AndroidBuilder;
pub use install::Installer;
pub use toolchain::Provisioner;
