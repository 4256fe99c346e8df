//! Canopy core library
//!
//! Provides the domain logic for deploying metadata archives and
//! installing package versions into a target org: validation, transport
//! selection, status polling, and stash persistence.

pub mod archive;
pub mod client;
pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod install;
pub mod org;
pub mod poll;
pub mod query;
pub mod stash;

/// Re-exports of commonly used types
pub mod prelude {
    // Context & configuration
    pub use crate::config::{CanopyConfig, ConfigStore};
    pub use crate::context::AppContext;
    pub use crate::org::Org;

    // Client
    pub use crate::client::rest::RestClient;
    pub use crate::client::types::{DeployState, DeployStatusRecord, InstallStatusRecord};
    pub use crate::client::{PlatformApi, PlatformError};

    // Commands
    pub use crate::deploy::{DeployOptions, MdDeploy, TestLevel};
    pub use crate::install::{
        ApexCompile, ConsentPrompt, InstallOptions, PackageInstall, SecurityType, UpgradeType,
    };

    // Errors & polling
    pub use crate::error::{CanopyError, Result};
    pub use crate::poll::{RetryBudget, Sleeper, TokioSleeper};
}
