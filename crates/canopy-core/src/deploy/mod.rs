//! Metadata deploy facade.
//!
//! Packages a directory (or accepts a pre-built archive), submits it over
//! REST or SOAP, stashes the job id for later resumption, and polls the
//! deploy request until a terminal status.

pub mod report;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::archive;
use crate::client::PlatformApi;
use crate::client::types::{DeployLaunch, DeployRequestOptions, DeployState, DeployStatusRecord};
use crate::context::AppContext;
use crate::error::{CanopyError, Result};
use crate::poll::Sleeper;
use crate::stash::{StashEntry, StashTarget};

/// Exit code the CLI reports for a failed or canceled deploy.
pub const DEPLOY_ERROR_EXIT_CODE: u8 = 1;

/// Sentinel wait value meaning "poll until terminal".
pub const WAIT_FOREVER: i64 = -1;

const DEFAULT_WAIT_MINUTES: i64 = 0;

const REQUIRED_ONE_OF: &str = "deploy-dir|zip-file|validated-deploy-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestLevel {
    NoTestRun,
    RunSpecifiedTests,
    RunLocalTests,
    RunAllTestsInOrg,
}

impl TestLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoTestRun => "NoTestRun",
            Self::RunSpecifiedTests => "RunSpecifiedTests",
            Self::RunLocalTests => "RunLocalTests",
            Self::RunAllTestsInOrg => "RunAllTestsInOrg",
        }
    }
}

impl FromStr for TestLevel {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NoTestRun" => Ok(Self::NoTestRun),
            "RunSpecifiedTests" => Ok(Self::RunSpecifiedTests),
            "RunLocalTests" => Ok(Self::RunLocalTests),
            "RunAllTestsInOrg" => Ok(Self::RunAllTestsInOrg),
            other => Err(CanopyError::Config(format!("unknown test level '{other}'"))),
        }
    }
}

/// Everything a deploy invocation can configure.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Directory of metadata to package and deploy.
    pub deploy_dir: Option<PathBuf>,
    /// Pre-built archive to deploy as-is.
    pub zip_file: Option<PathBuf>,
    /// Quick-deploy a previously validated request.
    pub validated_deploy_request_id: Option<String>,
    /// Resume reporting on an already submitted job.
    pub job_id: Option<String>,
    /// Minutes to wait for a terminal status; [`WAIT_FOREVER`] polls
    /// until terminal, the default checks once and returns.
    pub wait: Option<i64>,
    /// Legacy alias pair: `ignore_errors` wins when both are supplied
    /// through the API; the CLI only exposes `--ignore-errors`.
    pub rollback_on_error: Option<bool>,
    pub ignore_errors: Option<bool>,
    pub test_level: Option<TestLevel>,
    pub run_tests: Vec<String>,
    pub auto_update_package: bool,
    pub ignore_warnings: bool,
    pub check_only: bool,
    pub single_package: bool,
    pub purge_on_delete: bool,
    pub soap_deploy: bool,
}

impl DeployOptions {
    /// Rollback flag after legacy-alias normalization: `ignore_errors`
    /// is preferred, and rollback defaults to on.
    pub fn effective_rollback_on_error(&self) -> bool {
        match self.ignore_errors {
            Some(ignore) => !ignore,
            None => self.rollback_on_error.unwrap_or(true),
        }
    }

    pub fn wait_minutes(&self) -> i64 {
        self.wait.unwrap_or(DEFAULT_WAIT_MINUTES)
    }

    /// Options forwarded verbatim with the submission.
    pub fn to_request(&self) -> DeployRequestOptions {
        DeployRequestOptions {
            rollback_on_error: self.effective_rollback_on_error(),
            test_level: self.test_level.map(|level| level.as_str().to_string()),
            run_tests: self.run_tests.clone(),
            auto_update_package: self.auto_update_package,
            ignore_warnings: self.ignore_warnings,
            check_only: self.check_only,
            single_package: self.single_package,
            purge_on_delete: self.purge_on_delete,
        }
    }
}

/// Check a deploy invocation before any network call.
pub fn validate(options: &DeployOptions) -> Result<()> {
    if let Some(wait) = options.wait {
        if wait != WAIT_FOREVER && wait < 0 {
            return Err(CanopyError::InvalidWait {
                value: wait.to_string(),
            });
        }
    }

    if options.deploy_dir.is_none()
        && options.zip_file.is_none()
        && options.validated_deploy_request_id.is_none()
    {
        return Err(CanopyError::MissingRequiredParameter {
            names: REQUIRED_ONE_OF,
        });
    }

    if let Some(id) = &options.validated_deploy_request_id {
        if id.len() != 15 && id.len() != 18 {
            return Err(CanopyError::InvalidRequestId { id: id.clone() });
        }
    }

    let has_validated = options.validated_deploy_request_id.is_some();
    let has_job = options.job_id.is_some();
    exclusive(options.deploy_dir.is_some(), "deploy-dir", options.zip_file.is_some(), "zip-file")?;
    exclusive(options.deploy_dir.is_some(), "deploy-dir", has_validated, "validated-deploy-request-id")?;
    exclusive(options.zip_file.is_some(), "zip-file", has_validated, "validated-deploy-request-id")?;
    exclusive(options.deploy_dir.is_some(), "deploy-dir", has_job, "job-id")?;
    exclusive(options.zip_file.is_some(), "zip-file", has_job, "job-id")?;
    exclusive(options.check_only, "check-only", has_job, "job-id")?;
    exclusive(
        options.rollback_on_error.is_some(),
        "rollback-on-error",
        options.ignore_errors.is_some(),
        "ignore-errors",
    )?;
    exclusive(options.soap_deploy, "soap-deploy", has_job, "job-id")?;

    if let Some(dir) = &options.deploy_dir {
        stat_path(dir, "deploy-dir", PathKind::Directory)?;
    } else if let Some(file) = &options.zip_file {
        stat_path(file, "zip-file", PathKind::File)?;
    }

    Ok(())
}

fn exclusive(
    first_set: bool,
    first: &'static str,
    second_set: bool,
    second: &'static str,
) -> Result<()> {
    if first_set && second_set {
        Err(CanopyError::ExclusiveFlags { first, second })
    } else {
        Ok(())
    }
}

enum PathKind {
    Directory,
    File,
}

fn stat_path(path: &Path, flag: &'static str, kind: PathKind) -> Result<()> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(CanopyError::PathDoesNotExist {
                path: path.display().to_string(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    match kind {
        PathKind::Directory if meta.is_dir() => Ok(()),
        PathKind::File if meta.is_file() => Ok(()),
        PathKind::Directory => Err(CanopyError::InvalidDirectoryPath {
            flag,
            path: path.display().to_string(),
        }),
        PathKind::File => Err(CanopyError::InvalidFilePath {
            flag,
            path: path.display().to_string(),
        }),
    }
}

/// Deploy command over an [`AppContext`] and a platform client.
pub struct MdDeploy<'a> {
    ctx: &'a AppContext,
    client: &'a dyn PlatformApi,
    sleeper: &'a dyn Sleeper,
    stash_target: StashTarget,
}

impl<'a> MdDeploy<'a> {
    pub fn new(ctx: &'a AppContext, client: &'a dyn PlatformApi, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            ctx,
            client,
            sleeper,
            stash_target: StashTarget::MdapiDeploy,
        }
    }

    /// Stash under a different command family (used by source deploys).
    pub fn with_stash_target(mut self, target: StashTarget) -> Self {
        self.stash_target = target;
        self
    }

    /// Run the deploy described by `options` to a terminal outcome.
    ///
    /// Call [`validate`] first; this only re-checks what it must to stay
    /// safe when embedded.
    pub async fn deploy(&self, options: &DeployOptions) -> Result<DeployStatusRecord> {
        match &options.validated_deploy_request_id {
            Some(validated_id) => self.quick_deploy(validated_id, options).await,
            None => self.submit_and_report(options).await,
        }
    }

    async fn submit_and_report(&self, options: &DeployOptions) -> Result<DeployStatusRecord> {
        let launch = match &options.job_id {
            Some(job_id) => DeployLaunch {
                id: job_id.clone(),
                state: DeployState::Queued,
            },
            None => self.send_metadata(options).await?,
        };
        self.stash_job(&launch.id)?;
        self.report(&launch.id, options).await
    }

    async fn quick_deploy(
        &self,
        validated_id: &str,
        options: &DeployOptions,
    ) -> Result<DeployStatusRecord> {
        let launch = match &options.job_id {
            Some(job_id) => DeployLaunch {
                id: job_id.clone(),
                state: DeployState::Queued,
            },
            None => self
                .client
                .deploy_recent_validation(validated_id, self.use_rest(options))
                .await
                .map_err(|err| remap_malformed_id(err, validated_id))?,
        };
        self.stash_job(&launch.id)?;
        self.report(&launch.id, options).await
    }

    async fn send_metadata(&self, options: &DeployOptions) -> Result<DeployLaunch> {
        let archive_path = match (&options.deploy_dir, &options.zip_file) {
            (Some(dir), _) => archive::zip_directory(dir, None)?,
            (None, Some(zip_file)) => zip_file.clone(),
            (None, None) => {
                return Err(CanopyError::MissingRequiredParameter {
                    names: REQUIRED_ONE_OF,
                });
            }
        };
        let bytes = std::fs::read(&archive_path)?;
        let request = options.to_request();

        // REST is the default unless SOAP is requested on the command or
        // the rest_deploy config setting is explicitly off.
        if self.use_rest(options) {
            tracing::info!("deploying with REST");
            self.client.deploy_rest(bytes, &request).await
        } else {
            tracing::info!("deploying with SOAP");
            self.client.deploy_soap(bytes, &request).await
        }
    }

    fn use_rest(&self, options: &DeployOptions) -> bool {
        !options.soap_deploy && self.ctx.config().rest_deploy()
    }

    fn stash_job(&self, job_id: &str) -> Result<()> {
        self.ctx.stash().set(
            self.stash_target,
            &StashEntry {
                job_id: job_id.to_string(),
                target_username: self.ctx.org().username.clone(),
                stashed_at: chrono::Utc::now(),
            },
        )?;
        Ok(())
    }

    async fn report(&self, job_id: &str, options: &DeployOptions) -> Result<DeployStatusRecord> {
        let record = report::poll_deploy(self.client, self.sleeper, job_id, options.wait_minutes())
            .await
            .map_err(|err| remap_malformed_id(err, job_id))?;
        raise_if_deploy_failed(record, options)
    }
}

fn remap_malformed_id(err: CanopyError, id: &str) -> CanopyError {
    match err {
        CanopyError::Platform(platform) if platform.is_malformed_id() => {
            CanopyError::InvalidJobId { id: id.to_string() }
        }
        other => other,
    }
}

fn raise_if_deploy_failed(
    record: DeployStatusRecord,
    options: &DeployOptions,
) -> Result<DeployStatusRecord> {
    match record.status {
        DeployState::Canceled => Err(CanopyError::DeployCanceled {
            result: Box::new(record),
        }),
        DeployState::Failed => {
            let tests_ran = options.test_level != Some(TestLevel::NoTestRun);
            if tests_ran && record.has_test_failures() {
                Err(CanopyError::TestFailure {
                    result: Box::new(record),
                })
            } else {
                Err(CanopyError::DeployFailed {
                    result: Box::new(record),
                })
            }
        }
        _ => Ok(record),
    }
}
