//! Per-command stash persistence in the state directory.
//!
//! Each stash target owns one JSON file under `<state_dir>/stash/` holding
//! the most recent deploy job id and target username, so a later invocation
//! can resume reporting on it. Single-writer within one command run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which command family owns the stashed job id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashTarget {
    MdapiDeploy,
    SourceDeploy,
}

impl StashTarget {
    fn file_name(self) -> &'static str {
        match self {
            Self::MdapiDeploy => "mdapi-deploy.json",
            Self::SourceDeploy => "source-deploy.json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashEntry {
    pub job_id: String,
    pub target_username: String,
    pub stashed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Stash {
    dir: PathBuf,
}

impl Stash {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("stash"),
        }
    }

    /// Record the most recent job for `target` (atomic tmp + rename).
    pub fn set(&self, target: StashTarget, entry: &StashEntry) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create stash directory: {}", self.dir.display()))?;
        let path = self.dir.join(target.file_name());
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(entry)?;
        fs::write(&tmp, bytes)
            .with_context(|| format!("Failed to write stash: {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace stash: {}", path.display()))?;
        Ok(())
    }

    /// Load the stashed job for `target`, if any.
    pub fn get(&self, target: StashTarget) -> anyhow::Result<Option<StashEntry>> {
        let path = self.dir.join(target.file_name());
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read stash: {}", path.display()))?;
        let entry = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse stash: {}", path.display()))?;
        Ok(Some(entry))
    }
}
