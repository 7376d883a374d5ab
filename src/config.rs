//! Tool configuration.
//!
//! Resolution order, later layers overriding earlier ones:
//! 1. Defaults relative to the directory holding the executable, mirroring
//!    the release layout (`<release>/<tools>/<this tool>/`).
//! 2. A TOML file: `--config`, else `OVXR_DOCKER_CONFIG`, else
//!    `create-single-docker.toml` next to the executable when present.
//! 3. `OVXR_RELEASE_ROOT`, `OVXR_BAKE_SCRIPT`, `OVXR_REQUIRED_FILES`,
//!    `OVXR_OUTPUT_ROOT` environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::runlog::DEFAULT_OUTPUT_DIR;
use crate::version::PINNED_SDK_VERSION;

pub const CONFIG_FILENAME: &str = "create-single-docker.toml";
pub const CONFIG_ENV: &str = "OVXR_DOCKER_CONFIG";
pub const REQUIRED_FILES_FILENAME: &str = "required_files.conf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Root the required-files manifest is checked against.
    pub release_root: PathBuf,
    /// `bake-and-build.sh`
    pub bake_script: PathBuf,
    /// Required-files manifest.
    pub required_files: PathBuf,
    /// Parent of the per-run log directories.
    pub output_root: PathBuf,
    /// Pinned SDK version; `None` disables `--forcesdk`.
    pub sdk_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    release_root: Option<PathBuf>,
    bake_script: Option<PathBuf>,
    required_files: Option<PathBuf>,
    output_root: Option<PathBuf>,
    sdk_version: Option<String>,
}

impl ToolConfig {
    /// Defaults for a tool installed in `install_dir`, logging under `cwd`.
    pub fn defaults_for(install_dir: &Path, cwd: &Path) -> Self {
        let tools_dir = install_dir.parent().unwrap_or(install_dir);
        let release_root = tools_dir.parent().unwrap_or(tools_dir);
        Self {
            release_root: release_root.to_path_buf(),
            bake_script: tools_dir.join("bake-and-build").join("bake-and-build.sh"),
            required_files: install_dir.join(REQUIRED_FILES_FILENAME),
            output_root: cwd.join(DEFAULT_OUTPUT_DIR),
            sdk_version: Some(PINNED_SDK_VERSION.to_string()),
        }
    }

    /// Resolve the full configuration for this process.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self> {
        let exe = env::current_exe().context("resolving executable path")?;
        let install_dir = exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let cwd = env::current_dir().context("resolving current directory")?;

        let mut config = Self::defaults_for(&install_dir, &cwd);

        let file = match explicit_file {
            Some(path) => Some(path.to_path_buf()),
            None => match env::var_os(CONFIG_ENV) {
                Some(path) => Some(PathBuf::from(path)),
                None => Some(install_dir.join(CONFIG_FILENAME)).filter(|p| p.is_file()),
            },
        };
        if let Some(file) = file {
            config.merge_file(&file)?;
        }

        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Overlay values from a TOML file. Relative paths resolve against the
    /// file's directory.
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file '{}'", path.display()))?;
        let parsed: ConfigFile = toml::from_str(&text)
            .with_context(|| format!("parsing config file '{}'", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        if let Some(p) = parsed.release_root {
            self.release_root = base.join(p);
        }
        if let Some(p) = parsed.bake_script {
            self.bake_script = base.join(p);
        }
        if let Some(p) = parsed.required_files {
            self.required_files = base.join(p);
        }
        if let Some(p) = parsed.output_root {
            self.output_root = base.join(p);
        }
        if let Some(version) = parsed.sdk_version {
            self.sdk_version = normalize_version(&version);
        }
        Ok(())
    }

    /// Overlay environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        if let Some(p) = path("OVXR_RELEASE_ROOT") {
            self.release_root = p;
        }
        if let Some(p) = path("OVXR_BAKE_SCRIPT") {
            self.bake_script = p;
        }
        if let Some(p) = path("OVXR_REQUIRED_FILES") {
            self.required_files = p;
        }
        if let Some(p) = path("OVXR_OUTPUT_ROOT") {
            self.output_root = p;
        }
    }
}

fn normalize_version(version: &str) -> Option<String> {
    let version = version.trim();
    (!version.is_empty()).then(|| version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_follow_release_layout() {
        let config = ToolConfig::defaults_for(
            Path::new("/opt/ovxr-release/tools/create-docker"),
            Path::new("/work"),
        );
        assert_eq!(config.release_root, PathBuf::from("/opt/ovxr-release"));
        assert_eq!(
            config.bake_script,
            PathBuf::from("/opt/ovxr-release/tools/bake-and-build/bake-and-build.sh")
        );
        assert_eq!(
            config.required_files,
            PathBuf::from("/opt/ovxr-release/tools/create-docker/required_files.conf")
        );
        assert_eq!(config.output_root, PathBuf::from("/work/ovxr-docker.out"));
        assert_eq!(config.sdk_version.as_deref(), Some(PINNED_SDK_VERSION));
    }

    #[test]
    fn file_values_resolve_relative_to_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join(CONFIG_FILENAME);
        fs::write(
            &file,
            "bake_script = \"scripts/bake-and-build.sh\"\nsdk_version = \"\"\n",
        )
        .unwrap();

        let mut config = ToolConfig::defaults_for(Path::new("/a/b/c"), Path::new("/w"));
        config.merge_file(&file).unwrap();

        assert_eq!(config.bake_script, tmp.path().join("scripts/bake-and-build.sh"));
        assert_eq!(config.release_root, PathBuf::from("/a"));
        assert_eq!(config.sdk_version, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join(CONFIG_FILENAME);
        fs::write(&file, "bake = \"x\"\n").unwrap();

        let mut config = ToolConfig::defaults_for(Path::new("/a/b/c"), Path::new("/w"));
        assert!(config.merge_file(&file).is_err());
    }

    #[test]
    fn env_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("OVXR_OUTPUT_ROOT", "/logs"),
            ("OVXR_BAKE_SCRIPT", ""),
        ]
        .into_iter()
        .collect();

        let mut config = ToolConfig::defaults_for(Path::new("/a/b/c"), Path::new("/w"));
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.output_root, PathBuf::from("/logs"));
        assert_eq!(config.bake_script, PathBuf::from("/a/b/bake-and-build/bake-and-build.sh"));
    }
}
