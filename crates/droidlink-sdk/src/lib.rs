//! Android native library deployment for Rust
//!
//! `droidlink-sdk` compiles a Rust library for each Android ABI and installs
//! the resulting `lib<name>.so` files into an Android project's `jniLibs`
//! tree.
//!
//! # Architecture
//!
//! - **Catalog** ([`catalog`]): maps `all | aarch64 | armv7 | i686 | x86_64`
//!   onto Rust triples and ABI folder names
//! - **Builders** ([`builders`]): rustup provisioning, cargo builds, and
//!   atomic link/copy placement
//! - **Pipeline** ([`pipeline`]): runs the stages concurrently across targets
//!   with the failure policy of each stage
//!
//! # Example
//!
//! ```ignore
//! use droidlink_sdk::catalog::{resolve, ArchSelector};
//! use droidlink_sdk::pipeline::{Pipeline, PipelineOptions, RunStatus};
//! use droidlink_sdk::RunContext;
//!
//! let ctx = RunContext {
//!     project_root: "../voxel-android".into(),
//!     jni_libs_dir: "app/src/main/jniLibs".into(),
//!     crate_dir: ".".into(),
//!     build_root: "target".into(),
//!     library_name: "voxel".into(),
//!     features: vec!["android-lib".into()],
//!     targets: resolve(ArchSelector::All),
//! };
//!
//! let report = Pipeline::new(ctx, &PipelineOptions::default()).run().await;
//! assert_eq!(report.status(), RunStatus::Success);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod builders;
pub mod catalog;
pub mod pipeline;
pub mod types;

pub use catalog::{Arch, ArchSelector, TargetDescriptor};
pub use pipeline::{Pipeline, PipelineOptions, PipelineOutcome, PipelineReport, RunStatus};
pub use types::{
    BuildError, BuildOutcome, CommandError, DroidlinkError, InstallError, InstallMode,
    InstalledArtifact, ProvisionError, RunContext,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default `jniLibs` location inside an Android project.
pub const DEFAULT_JNI_LIBS_DIR: &str = "app/src/main/jniLibs";
