//! Configuration loading and merging.
//!
//! Two TOML files feed one [`CanopyConfig`]: a global file under the user
//! config directory and an optional `canopy.toml` at the project root.
//! Project values win; org and alias tables are merged key-by-key.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::org::Org;

pub const CONFIG_FILE_NAME: &str = "canopy.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanopyConfig {
    /// Org used when a command does not pass `--target-org`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_org: Option<String>,

    /// Whether metadata deploys go over REST. SOAP is used when this is
    /// explicitly `false` or the command passes `--soap-deploy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_deploy: Option<bool>,

    /// Authenticated orgs, keyed by username or alias.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub orgs: BTreeMap<String, Org>,

    /// Short names for subscriber package version ids.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub package_aliases: BTreeMap<String, String>,
}

impl CanopyConfig {
    /// Effective transport default; REST unless configured off.
    pub fn rest_deploy(&self) -> bool {
        self.rest_deploy.unwrap_or(true)
    }
}

/// Loads and merges the global and project config files.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    global_path: PathBuf,
    project_path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(global_config_dir: &Path, project_root: &Path) -> Self {
        Self {
            global_path: global_config_dir.join(CONFIG_FILE_NAME),
            project_path: project_root.join(CONFIG_FILE_NAME),
        }
    }

    /// Store rooted at the conventional locations for this user.
    pub fn with_defaults() -> anyhow::Result<Self> {
        let global_config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?
            .join("canopy");
        let project_root = std::env::current_dir()?;
        Ok(Self::from_paths(&global_config_dir, &project_root))
    }

    pub fn load(&self) -> anyhow::Result<CanopyConfig> {
        let global = load_file(&self.global_path)?;
        let project = load_file(&self.project_path)?;
        Ok(merge(global, project))
    }
}

fn load_file(path: &Path) -> anyhow::Result<Option<CanopyConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(Some(config))
}

fn merge(global: Option<CanopyConfig>, project: Option<CanopyConfig>) -> CanopyConfig {
    let mut merged = global.unwrap_or_default();
    let Some(project) = project else {
        return merged;
    };

    if project.default_org.is_some() {
        merged.default_org = project.default_org;
    }
    if project.rest_deploy.is_some() {
        merged.rest_deploy = project.rest_deploy;
    }
    merged.orgs.extend(project.orgs);
    merged.package_aliases.extend(project.package_aliases);
    merged
}
