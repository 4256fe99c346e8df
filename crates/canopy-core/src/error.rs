//! Error types for canopy operations.
//!
//! Every failure a caller may want to branch on has its own variant;
//! platform errors that carry no special meaning for us pass through
//! unmodified in [`CanopyError::Platform`].

use thiserror::Error;

use crate::client::PlatformError;
use crate::client::types::DeployStatusRecord;

pub type Result<T> = std::result::Result<T, CanopyError>;

#[derive(Debug, Error)]
pub enum CanopyError {
    #[error("missing required parameter: expected one of {names}")]
    MissingRequiredParameter { names: &'static str },

    #[error("invalid wait value '{value}': must be -1 or a nonnegative number of minutes")]
    InvalidWait { value: String },

    #[error("--{first} cannot be used together with --{second}")]
    ExclusiveFlags {
        first: &'static str,
        second: &'static str,
    },

    #[error("path does not exist: {path}")]
    PathDoesNotExist { path: String },

    #[error("--{flag} must point to a directory: {path}")]
    InvalidDirectoryPath {
        flag: &'static str,
        path: String,
    },

    #[error("--{flag} must point to a file: {path}")]
    InvalidFilePath {
        flag: &'static str,
        path: String,
    },

    #[error("invalid validated deploy request id: {id}")]
    InvalidRequestId { id: String },

    #[error("invalid deploy job id: {id}")]
    InvalidJobId { id: String },

    #[error("the metadata deploy failed")]
    DeployFailed { result: Box<DeployStatusRecord> },

    #[error("the metadata deploy was canceled")]
    DeployCanceled { result: Box<DeployStatusRecord> },

    #[error("the metadata deploy failed because of test failures")]
    TestFailure { result: Box<DeployStatusRecord> },

    #[error("exactly one of --id or --package must be provided")]
    RequiredFlags,

    #[error("invalid subscriber package version id or alias: {id}")]
    InvalidPackageId { id: String },

    #[error(
        "the package version is not yet available in the target org; \
         retry later or increase --publish-wait"
    )]
    ReplicationTimeout,

    #[error("{message}")]
    InstallFailed { message: String },

    #[error("operation canceled at user request")]
    PromptDenied,

    #[error("this command is supported only on API version {minimum}.0 and higher (org is on {version})")]
    UnsupportedApiVersion { version: String, minimum: u32 },

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CanopyError {
    /// True for terminal deploy outcomes that the CLI reports with the
    /// dedicated deploy-error exit code.
    pub fn is_deploy_failure(&self) -> bool {
        matches!(
            self,
            Self::DeployFailed { .. } | Self::DeployCanceled { .. } | Self::TestFailure { .. }
        )
    }

    /// The terminal status payload attached to this error, if any.
    pub fn deploy_result(&self) -> Option<&DeployStatusRecord> {
        match self {
            Self::DeployFailed { result }
            | Self::DeployCanceled { result }
            | Self::TestFailure { result } => Some(result),
            _ => None,
        }
    }
}
