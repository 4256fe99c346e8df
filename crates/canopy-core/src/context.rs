//! Application context passed through command execution.
//!
//! Commands receive an explicit context instead of reaching for process
//! globals; the CLI builds one per invocation and threads it through.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::{CanopyConfig, ConfigStore};
use crate::org::Org;
use crate::stash::Stash;

#[derive(Debug, Clone)]
pub struct AppContext {
    config: CanopyConfig,
    state_dir: PathBuf,
    org: Org,
}

impl AppContext {
    /// Create a context with explicit parts (used by tests and embedders).
    pub fn new(config: CanopyConfig, state_dir: PathBuf, org: Org) -> Self {
        Self {
            config,
            state_dir,
            org,
        }
    }

    /// Resolve a context from the user's config files.
    ///
    /// `target_org` overrides the configured `default_org`.
    pub fn resolve(target_org: Option<&str>) -> anyhow::Result<Self> {
        let config = ConfigStore::with_defaults()?.load()?;

        let name = target_org
            .map(str::to_string)
            .or_else(|| config.default_org.clone())
            .context("No target org: pass --target-org or set default_org in canopy.toml")?;
        let org = config
            .orgs
            .get(&name)
            .cloned()
            .with_context(|| format!("Org '{name}' is not configured in canopy.toml"))?;

        let state_dir = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow::anyhow!("Cannot determine state directory"))?
            .join("canopy");

        Ok(Self::new(config, state_dir, org))
    }

    pub fn config(&self) -> &CanopyConfig {
        &self.config
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn org(&self) -> &Org {
        &self.org
    }

    /// Get the stash for this context's state directory.
    pub fn stash(&self) -> Stash {
        Stash::new(&self.state_dir)
    }
}
