//! `run-manifest.json`: machine-readable record of one run, kept next to the
//! run's logs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::runlog::iso_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub status: RunStatus,
    pub created_at_utc: String,
    pub finished_at_utc: Option<String>,
    pub platform: String,
    pub sdk_version: Option<String>,
    pub target: String,
    pub docker_name: Option<String>,
    pub exit_code: Option<i32>,
    pub docker_image: Option<PathBuf>,
}

impl RunManifest {
    pub fn started(
        run_id: String,
        platform: &str,
        sdk_version: Option<&str>,
        target: &str,
        docker_name: Option<&str>,
    ) -> Self {
        Self {
            run_id,
            status: RunStatus::Running,
            created_at_utc: iso_timestamp(),
            finished_at_utc: None,
            platform: platform.to_string(),
            sdk_version: sdk_version.map(str::to_string),
            target: target.to_string(),
            docker_name: docker_name.map(str::to_string),
            exit_code: None,
            docker_image: None,
        }
    }

    pub fn finish(&mut self, exit_code: i32, docker_image: Option<PathBuf>) {
        self.status = if exit_code == 0 {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
        self.exit_code = Some(exit_code);
        self.docker_image = docker_image;
        self.finished_at_utc = Some(iso_timestamp());
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_manifest_file(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("reading run manifest '{}'", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing run manifest '{}'", path.display()))
    }
}

/// Stages the manifest beside `path`, then renames it into place.
fn write_manifest_file(path: &Path, manifest: &RunManifest) -> Result<()> {
    let run_dir = path
        .parent()
        .ok_or_else(|| anyhow!("run manifest path '{}' has no run directory", path.display()))?;
    fs::create_dir_all(run_dir)
        .with_context(|| format!("creating run directory '{}'", run_dir.display()))?;
    let staged = path.with_extension(format!("tmp-{}", std::process::id()));
    let json = serde_json::to_vec_pretty(manifest).context("encoding run manifest as JSON")?;
    fs::write(&staged, json)
        .with_context(|| format!("staging run manifest '{}'", staged.display()))?;
    fs::rename(&staged, path)
        .with_context(|| format!("moving run manifest into place at '{}'", path.display()))?;
    Ok(())
}
