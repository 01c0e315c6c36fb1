//! The provision → build → install pipeline.
//!
//! ```text
//! Start -> CatalogResolved -> ToolchainsAttempted -> Aborted
//!                                                  -> BuildInProgress -> BuildFailed
//!                                                                     -> AllBuilt -> InstallInProgress -> InstallFailed
//!                                                                                                      -> Done
//! ```
//!
//! Provisioning and building run on a bounded pool of tokio tasks, one task
//! per target, with results funnelled through a single `JoinSet`.
//!
//! - Provisioning failures are collected; the failed targets are dropped and
//!   the rest continue.
//! - The first build failure cancels builds that have not started yet.
//!   Builds already running finish, but their results are discarded and
//!   nothing is installed.
//! - Installation stops at the first failure.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::builders::common::{CancelFlag, DEFAULT_TIMEOUT, describe_command, run_command};
use crate::builders::{AndroidBuilder, Installer, Provisioner};
use crate::catalog::TargetDescriptor;
use crate::types::{
    BuildError, BuildOutcome, CommandError, InstallError, InstallMode, InstalledArtifact, ProvisionError,
    RunContext,
};

/// Operational knobs for a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Maximum number of targets processed at once.
    pub jobs: usize,
    /// Timeout for each external command.
    pub timeout: Duration,
    pub install_mode: InstallMode,
    /// rustup executable.
    pub rustup: PathBuf,
    /// cargo executable.
    pub cargo: PathBuf,
    /// Optional pre-flight script run once before provisioning.
    pub ndk_check: Option<PathBuf>,
    /// Pass the build root to cargo as `--target-dir`.
    pub explicit_target_dir: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            timeout: DEFAULT_TIMEOUT,
            install_mode: InstallMode::default(),
            rustup: PathBuf::from("rustup"),
            cargo: PathBuf::from("cargo"),
            ndk_check: None,
            explicit_target_dir: false,
        }
    }
}

/// Worker pool size when none is configured.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Pipeline position, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    CatalogResolved,
    ToolchainsAttempted,
    Aborted,
    BuildInProgress,
    BuildFailed,
    AllBuilt,
    InstallInProgress,
    InstallFailed,
    Done,
}

/// How a run ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every surviving target was built and installed.
    Done,
    /// Provisioning failed for every target; nothing was built.
    Aborted,
    /// A build failed; nothing was installed.
    BuildFailed(BuildError),
    /// Installation failed part-way.
    InstallFailed(InstallError),
}

/// Coarse run result, used for the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Everything requested was built and installed.
    Success,
    /// Some targets could not be provisioned; everything else completed.
    ProvisionIncomplete,
    /// A build or install failed, or no target could be provisioned.
    Failed,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct PipelineReport {
    /// Targets requested for the run.
    pub targets: Vec<TargetDescriptor>,
    pub provision_failures: Vec<ProvisionError>,
    /// Build results in catalog order; empty when building never started.
    pub build_outcomes: Vec<BuildOutcome>,
    pub installed: Vec<InstalledArtifact>,
    pub outcome: PipelineOutcome,
}

impl PipelineReport {
    pub fn status(&self) -> RunStatus {
        match self.outcome {
            PipelineOutcome::Done if self.provision_failures.is_empty() => RunStatus::Success,
            PipelineOutcome::Done => RunStatus::ProvisionIncomplete,
            PipelineOutcome::Aborted
            | PipelineOutcome::BuildFailed(_)
            | PipelineOutcome::InstallFailed(_) => RunStatus::Failed,
        }
    }

    pub fn final_stage(&self) -> Stage {
        match self.outcome {
            PipelineOutcome::Done => Stage::Done,
            PipelineOutcome::Aborted => Stage::Aborted,
            PipelineOutcome::BuildFailed(_) => Stage::BuildFailed,
            PipelineOutcome::InstallFailed(_) => Stage::InstallFailed,
        }
    }
}

/// One step a run would take, as listed by [`Pipeline::plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedStep {
    Check { command: String },
    Provision { triple: &'static str, command: String },
    Build { triple: &'static str, command: String, artifact: PathBuf },
    Install { triple: &'static str, mode: InstallMode, destination: PathBuf, artifact: PathBuf },
}

impl fmt::Display for PlannedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedStep::Check { command } => write!(f, "check      {command}"),
            PlannedStep::Provision { command, .. } => write!(f, "provision  {command}"),
            PlannedStep::Build { command, .. } => write!(f, "build      {command}"),
            PlannedStep::Install {
                mode,
                destination,
                artifact,
                ..
            } => write!(
                f,
                "{:<10} {} -> {}",
                mode.as_str(),
                destination.display(),
                artifact.display()
            ),
        }
    }
}

/// A configured run over a fixed set of targets.
pub struct Pipeline {
    ctx: RunContext,
    provisioner: Arc<Provisioner>,
    builder: Arc<AndroidBuilder>,
    installer: Arc<Installer>,
    jobs: usize,
    timeout: Duration,
    ndk_check: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(ctx: RunContext, options: &PipelineOptions) -> Self {
        let provisioner = Provisioner::new(&options.rustup).timeout(options.timeout);
        let builder = AndroidBuilder::new(&ctx.crate_dir, &ctx.build_root, &ctx.library_name)
            .features(ctx.features.clone())
            .cargo(&options.cargo)
            .explicit_target_dir(options.explicit_target_dir)
            .timeout(options.timeout);
        let installer = Installer::new(
            &ctx.project_root,
            &ctx.jni_libs_dir,
            &ctx.library_name,
            options.install_mode,
        );

        Self {
            ctx,
            provisioner: Arc::new(provisioner),
            builder: Arc::new(builder),
            installer: Arc::new(installer),
            jobs: options.jobs.max(1),
            timeout: options.timeout,
            ndk_check: options.ndk_check.clone(),
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Lists every command and placement a run would perform, without side effects.
    pub fn plan(&self) -> Vec<PlannedStep> {
        let mut steps = Vec::new();

        if let Some(script) = &self.ndk_check {
            steps.push(PlannedStep::Check {
                command: script.display().to_string(),
            });
        }
        for descriptor in &self.ctx.targets {
            steps.push(PlannedStep::Provision {
                triple: descriptor.triple,
                command: describe_command(&self.provisioner.command(descriptor)),
            });
        }
        for descriptor in &self.ctx.targets {
            steps.push(PlannedStep::Build {
                triple: descriptor.triple,
                command: describe_command(&self.builder.command(descriptor)),
                artifact: self.builder.artifact_path(descriptor),
            });
        }
        for descriptor in &self.ctx.targets {
            let artifact = self.builder.artifact_path(descriptor);
            for folder in descriptor.output_folders {
                steps.push(PlannedStep::Install {
                    triple: descriptor.triple,
                    mode: self.installer.mode(),
                    destination: self.installer.destination(folder),
                    artifact: artifact.clone(),
                });
            }
        }

        steps
    }

    /// Runs the whole pipeline.
    pub async fn run(&self) -> PipelineReport {
        let mut stage = Stage::Start;
        let targets = self.ctx.targets.clone();
        advance(&mut stage, Stage::CatalogResolved);
        info!(
            targets = ?targets.iter().map(|t| t.triple).collect::<Vec<_>>(),
            "resolved targets"
        );

        self.run_ndk_check().await;

        let (provisioned, provision_failures) = self.provision_all(&targets).await;
        advance(&mut stage, Stage::ToolchainsAttempted);

        let mut report = PipelineReport {
            targets,
            provision_failures,
            build_outcomes: Vec::new(),
            installed: Vec::new(),
            outcome: PipelineOutcome::Done,
        };

        if provisioned.is_empty() {
            advance(&mut stage, Stage::Aborted);
            error!("no target could be provisioned, aborting");
            report.outcome = PipelineOutcome::Aborted;
            return report;
        }

        advance(&mut stage, Stage::BuildInProgress);
        let (outcomes, build_failure) = self.build_all(&provisioned).await;
        report.build_outcomes = outcomes;
        if let Some(err) = build_failure {
            advance(&mut stage, Stage::BuildFailed);
            report.outcome = PipelineOutcome::BuildFailed(err);
            return report;
        }
        advance(&mut stage, Stage::AllBuilt);

        advance(&mut stage, Stage::InstallInProgress);
        let installer = Arc::clone(&self.installer);
        let outcomes = report.build_outcomes.clone();
        let (installed, result) =
            match tokio::task::spawn_blocking(move || install_all(&installer, &outcomes)).await {
                Ok(placed) => placed,
                Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
            };
        report.installed = installed;
        match result {
            Ok(()) => {
                advance(&mut stage, Stage::Done);
            }
            Err(err) => {
                error!(triple = err.triple(), path = %err.path().display(), error = %err, "install failed");
                advance(&mut stage, Stage::InstallFailed);
                report.outcome = PipelineOutcome::InstallFailed(err);
            }
        }

        report
    }

    /// Runs the configured NDK pre-flight script. Failures only warn.
    async fn run_ndk_check(&self) {
        let Some(script) = &self.ndk_check else {
            return;
        };

        let mut cmd = tokio::process::Command::new(script);
        cmd.current_dir(&self.ctx.crate_dir);
        info!(script = %script.display(), "checking for Android NDK");

        if let Err(err) = run_command(cmd, self.timeout, None).await {
            warn!(error = %err, "NDK check failed, continuing");
        }
    }

    /// Provisions every target concurrently. Failed targets are returned separately.
    async fn provision_all(
        &self,
        targets: &[TargetDescriptor],
    ) -> (Vec<TargetDescriptor>, Vec<ProvisionError>) {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut join_set = JoinSet::new();

        for (index, descriptor) in targets.iter().copied().enumerate() {
            let provisioner = Arc::clone(&self.provisioner);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = provisioner.ensure_installed(&descriptor).await;
                (index, descriptor, result)
            });
        }

        let mut provisioned = Vec::new();
        let mut failures = Vec::new();
        let mut reported = vec![false; targets.len()];
        let mut lost_reason = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, descriptor, Ok(()))) => {
                    reported[index] = true;
                    provisioned.push((index, descriptor));
                }
                Ok((index, _, Err(err))) => {
                    reported[index] = true;
                    warn!(triple = err.triple, error = %err, "toolchain provisioning failed, skipping target");
                    failures.push((index, err));
                }
                Err(join_err) => {
                    error!(error = %join_err, "provisioning task panicked");
                    lost_reason.get_or_insert(join_err.to_string());
                }
            }
        }

        if let Some(reason) = lost_reason {
            failures.extend(self.unreported_provisions(targets, &reported, &reason));
        }

        provisioned.sort_by_key(|(index, _)| *index);
        failures.sort_by_key(|(index, _)| *index);

        (
            provisioned.into_iter().map(|(_, d)| d).collect(),
            failures.into_iter().map(|(_, e)| e).collect(),
        )
    }

    /// Turns targets whose provisioning task never reported back into failures.
    fn unreported_provisions(
        &self,
        targets: &[TargetDescriptor],
        reported: &[bool],
        reason: &str,
    ) -> Vec<(usize, ProvisionError)> {
        targets
            .iter()
            .enumerate()
            .filter(|(index, _)| !reported[*index])
            .map(|(index, descriptor)| {
                let command = describe_command(&self.provisioner.command(descriptor));
                let err = ProvisionError {
                    triple: descriptor.triple,
                    source: CommandError::WorkerFailed {
                        command,
                        reason: reason.to_string(),
                    },
                };
                warn!(triple = descriptor.triple, error = %err, "toolchain provisioning lost, skipping target");
                (index, err)
            })
            .collect()
    }

    /// Builds every target concurrently, stopping at the first failure.
    ///
    /// Returns the outcome of every target that reported back, and the first
    /// build error, if any.
    async fn build_all(
        &self,
        targets: &[TargetDescriptor],
    ) -> (Vec<BuildOutcome>, Option<BuildError>) {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let cancel = CancelFlag::new();
        let mut join_set = JoinSet::new();

        for (index, descriptor) in targets.iter().copied().enumerate() {
            let builder = Arc::clone(&self.builder);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = builder.build(&descriptor, &cancel).await;
                if matches!(&result, Err(err) if !err.is_cancelled()) {
                    cancel.cancel();
                }
                (index, descriptor, result)
            });
        }

        let mut outcomes = Vec::new();
        let mut first_failure: Option<BuildError> = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, descriptor, Ok(artifact))) => {
                    if first_failure.is_some() {
                        debug!(triple = descriptor.triple, "discarding build finished after a failure");
                    }
                    outcomes.push((index, BuildOutcome::built(descriptor, artifact)));
                }
                Ok((_, descriptor, Err(err))) if err.is_cancelled() => {
                    debug!(triple = descriptor.triple, "build cancelled");
                }
                Ok((index, descriptor, Err(err))) => {
                    outcomes.push((index, BuildOutcome::failed(descriptor)));
                    if first_failure.is_none() {
                        error!(triple = descriptor.triple, exit_code = ?err.exit_code(), error = %err, "build failed, cancelling remaining builds");
                        first_failure = Some(err);
                    } else {
                        warn!(triple = descriptor.triple, error = %err, "additional build failure");
                    }
                }
                Err(join_err) => {
                    cancel.cancel();
                    error!(error = %join_err, "build task panicked");
                    first_failure.get_or_insert(BuildError::Worker(join_err.to_string()));
                }
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        let outcomes = outcomes.into_iter().map(|(_, outcome)| outcome).collect();
        (outcomes, first_failure)
    }

}

/// Installs every built artifact in catalog order, stopping at the first failure.
///
/// Blocking filesystem work; runs on tokio's blocking pool.
fn install_all(
    installer: &Installer,
    outcomes: &[BuildOutcome],
) -> (Vec<InstalledArtifact>, Result<(), InstallError>) {
    let mut installed = Vec::new();
    for outcome in outcomes {
        let Some(artifact) = &outcome.artifact_path else {
            continue;
        };
        match installer.install(&outcome.descriptor, artifact) {
            Ok(placed) => installed.push(placed),
            Err(err) => return (installed, Err(err)),
        }
    }
    (installed, Ok(()))
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = ?*stage, to = ?next, "pipeline stage");
    *stage = next;
}
