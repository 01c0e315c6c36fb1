//! # droidlink
//!
//! Command-line tool that compiles a Rust library for Android ABIs and links
//! the results into an Android project's `jniLibs` tree.
//!
//! ## Quick Start
//!
//! ```bash
//! # Build for every ABI and link into ../voxel-android/app/src/main/jniLibs
//! droidlink ../voxel-android
//!
//! # One architecture only
//! droidlink ../voxel-android --arch x86_64
//!
//! # Show what would run without running it
//! droidlink ../voxel-android --dry-run
//! ```
//!
//! ## What a run does
//!
//! 1. Resolves `--arch` to Rust targets (`all` means every ABI)
//! 2. Runs `rustup target add <triple>` for each target; targets that fail
//!    here are skipped and the run exits non-zero
//! 3. Runs `cargo build --release --lib --features=android-lib --target <triple>`
//!    for each remaining target; the first failure stops the run
//! 4. Links `lib<name>.so` into every ABI folder of each target
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | `0` | Every target built and installed |
//! | `1` | A build or install failed, no target could be provisioned, or setup failed |
//! | `2` | Invalid arguments (including an unknown `--arch`) |
//! | `3` | Some targets could not be provisioned; the rest completed |
//! | `130` | Interrupted |
//!
//! ## Configuration
//!
//! Settings can be persisted in `droidlink.toml`; see [`config`].
//!
//! ## Logging
//!
//! Progress is logged to stderr. `--verbose` shows every command and its
//! output; `RUST_LOG` overrides the filter entirely.

#![cfg_attr(docsrs, feature(doc_cfg))]

use anyhow::{Context, Result};
use clap::Parser;
use droidlink_sdk::builders::common::{
    get_cargo_target_dir, read_package_name, validate_project_root,
};
use droidlink_sdk::catalog::{self, ArchSelector};
use droidlink_sdk::pipeline::{Pipeline, PipelineOptions, PipelineOutcome, PipelineReport, RunStatus};
use droidlink_sdk::{DroidlinkError, InstallMode, RunContext};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub mod config;

use config::ConfigResolver;

/// Compile a Rust library for Android ABIs and link it into jniLibs.
#[derive(Parser, Debug)]
#[command(name = "droidlink", author, version, about, long_about = None)]
pub struct Cli {
    /// Root of the Android project that consumes the library
    pub project_path: PathBuf,

    /// Target architecture: all, aarch64, armv7, i686 or x86_64
    #[arg(short, long, default_value = "all", value_parser = parse_selector)]
    pub arch: ArchSelector,

    /// Path to droidlink.toml (searched for from the current directory by default)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of targets provisioned or built at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Timeout in seconds for each rustup/cargo invocation
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Copy the library into jniLibs instead of symlinking it
    #[arg(long)]
    pub copy: bool,

    /// Print the commands and links without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Show every command and its output
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_selector(value: &str) -> Result<ArchSelector, String> {
    value
        .parse::<ArchSelector>()
        .map_err(|e: DroidlinkError| e.to_string())
}

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    Failed,
    ProvisionIncomplete,
    Interrupted,
}

impl Exit {
    pub fn code(self) -> u8 {
        match self {
            Exit::Success => 0,
            Exit::Failed => 1,
            Exit::ProvisionIncomplete => 3,
            Exit::Interrupted => 130,
        }
    }
}

impl From<RunStatus> for Exit {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Success => Exit::Success,
            RunStatus::ProvisionIncomplete => Exit::ProvisionIncomplete,
            RunStatus::Failed => Exit::Failed,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Parses the command line and runs droidlink.
pub fn run() -> Result<Exit> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run_with(cli)
}

/// Runs droidlink with already-parsed arguments.
pub fn run_with(cli: Cli) -> Result<Exit> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let resolver = match &cli.config {
        Some(path) => ConfigResolver::from_file(path)?,
        None => ConfigResolver::discover(&cwd)?,
    };
    if let Some(path) = &resolver.config_path {
        tracing::info!(config = %path.display(), "loaded configuration");
    }

    let (ctx, options) = resolve_run(&cli, &resolver)?;

    println!("Project: {}", ctx.project_root.display());
    println!(
        "Targets: {}",
        ctx.targets
            .iter()
            .map(|t| t.triple)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let pipeline = Pipeline::new(ctx, &options);

    if cli.dry_run {
        println!("Dry run, nothing will be executed:");
        for step in pipeline.plan() {
            println!("  {step}");
        }
        return Ok(Exit::Success);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    Ok(runtime.block_on(run_until_interrupted(&pipeline)))
}

/// Builds the run context and pipeline options from CLI flags and config.
fn resolve_run(cli: &Cli, resolver: &ConfigResolver) -> Result<(RunContext, PipelineOptions)> {
    let config = &resolver.config;

    let project_root = std::path::absolute(&cli.project_path)
        .with_context(|| format!("Failed to resolve project path: {:?}", cli.project_path))?;
    validate_project_root(&project_root)?;

    let crate_dir = resolver.crate_dir();
    let rustup = resolver.tool(&config.tools.rustup);
    let cargo = resolver.tool(&config.tools.cargo);

    let library_name = resolve_library_name(resolver, &crate_dir)?;

    let build_root = match &config.build.target_dir {
        Some(dir) => resolver.path(dir),
        None => get_cargo_target_dir(&cargo, &crate_dir),
    };

    let jobs = resolver.resolve(cli.jobs, |c| c.build.jobs, droidlink_sdk::pipeline::default_jobs());
    if jobs == 0 {
        return Err(DroidlinkError::Config("jobs must be at least 1".into()).into());
    }
    let timeout_secs = resolver.resolve(
        cli.timeout_secs,
        |c| c.build.timeout_secs,
        droidlink_sdk::builders::common::DEFAULT_TIMEOUT.as_secs(),
    );
    let install_mode = resolver.resolve(
        cli.copy.then_some(InstallMode::Copy),
        |c| c.build.install_mode,
        InstallMode::default(),
    );

    let ctx = RunContext {
        project_root,
        jni_libs_dir: config.android.jni_libs_dir.clone(),
        crate_dir,
        build_root,
        library_name,
        features: config.library.features.clone(),
        targets: catalog::resolve(cli.arch),
    };

    let options = PipelineOptions {
        jobs,
        timeout: Duration::from_secs(timeout_secs),
        install_mode,
        rustup,
        cargo,
        ndk_check: resolver.ndk_check(),
        explicit_target_dir: config.build.target_dir.is_some(),
    };

    tracing::debug!(?ctx, ?options, "resolved run");
    Ok((ctx, options))
}

fn resolve_library_name(resolver: &ConfigResolver, crate_dir: &Path) -> Result<String> {
    if let Some(name) = &resolver.config.library.name {
        return Ok(name.clone());
    }

    let manifest = crate_dir.join("Cargo.toml");
    read_package_name(&manifest)
        .map(|name| name.replace('-', "_"))
        .ok_or_else(|| {
            DroidlinkError::Config(format!(
                "could not read the library name from {}. Set [library] name in droidlink.toml",
                manifest.display()
            ))
            .into()
        })
}

/// Runs the pipeline, aborting with [`Exit::Interrupted`] on Ctrl-C.
async fn run_until_interrupted(pipeline: &Pipeline) -> Exit {
    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        report = pipeline.run() => {
            print_report(&report);
            report.status().into()
        }
        () = interrupted => {
            eprintln!("Interrupted: run aborted, no library was partially written");
            Exit::Interrupted
        }
    }
}

/// One line per requested target, in catalog order.
fn target_summary(report: &PipelineReport) -> Vec<String> {
    report
        .targets
        .iter()
        .map(|target| {
            let status = if report
                .provision_failures
                .iter()
                .any(|f| f.triple == target.triple)
            {
                "toolchain missing"
            } else if report
                .installed
                .iter()
                .any(|i| i.triple == target.triple)
            {
                "installed"
            } else {
                match report
                    .build_outcomes
                    .iter()
                    .find(|o| o.descriptor.triple == target.triple)
                {
                    Some(outcome) if !outcome.succeeded => "build failed",
                    Some(_) => "built, not installed",
                    None if matches!(report.outcome, PipelineOutcome::Aborted) => "not built",
                    None => "cancelled",
                }
            };
            format!("{:<26} {status}", target.triple)
        })
        .collect()
}

fn print_report(report: &PipelineReport) {
    println!("Summary:");
    for line in target_summary(report) {
        println!("  {line}");
    }

    if !report.provision_failures.is_empty() {
        eprintln!(
            "Toolchain provisioning failed for {} target(s):",
            report.provision_failures.len()
        );
        for failure in &report.provision_failures {
            eprintln!("  {failure}");
        }
    }

    for installed in &report.installed {
        println!("Installed {}:", installed.triple);
        for destination in &installed.destinations {
            println!(
                "  {} -> {}",
                destination.display(),
                installed.artifact.display()
            );
        }
    }

    match &report.outcome {
        PipelineOutcome::Done => {
            if report.provision_failures.is_empty() {
                println!("Done: {} target(s) installed", report.installed.len());
            } else {
                eprintln!(
                    "Done with errors: {} target(s) installed, {} skipped",
                    report.installed.len(),
                    report.provision_failures.len()
                );
            }
        }
        PipelineOutcome::Aborted => {
            eprintln!("Error: no target could be provisioned, nothing was built");
        }
        PipelineOutcome::BuildFailed(err) => {
            eprintln!("Error: {err}");
            eprintln!("No libraries were installed.");
        }
        PipelineOutcome::InstallFailed(err) => {
            eprintln!("Error: {err}");
        }
    }
}

/// Initializes logging to stderr.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "droidlink=debug,droidlink_sdk=debug"
    } else {
        "droidlink=info,droidlink_sdk=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
