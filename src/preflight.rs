//! Preflight checks run before any archive is touched.
//!
//! - the required-files manifest shipped with the release
//! - the build script and the shell that runs it

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Shell used to run the build script.
pub const BUILD_SHELL: &str = "bash";

/// Read a required-files manifest: one relative path per line, blank lines
/// and `#` comments skipped.
pub fn read_manifest(manifest: &Path) -> Result<Vec<String>> {
    if !manifest.exists() {
        bail!("Config file not found: {}", manifest.display());
    }
    let text = fs::read_to_string(manifest)
        .with_context(|| format!("reading required files list '{}'", manifest.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Check every manifest entry exists under `root`.
///
/// Returns the number of files checked.
pub fn check_required_files(manifest: &Path, root: &Path) -> Result<usize> {
    let entries = read_manifest(manifest)?;

    let missing: Vec<PathBuf> = entries
        .iter()
        .map(|rel| root.join(rel))
        .filter(|path| !path.exists())
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|p| format!("  {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n");
        bail!(
            "Missing required files:\n{}\n\
             If you are unsure, re-download the latest 8000-emulator-eft*.tar and untar to restore missing files.",
            msg
        );
    }

    Ok(entries.len())
}

/// The build script must exist and the shell must be on `PATH`.
pub fn check_build_script(script: &Path) -> Result<PathBuf> {
    if !script.is_file() {
        bail!("bake-and-build.sh not found: {}", script.display());
    }
    which::which(BUILD_SHELL)
        .with_context(|| format!("'{BUILD_SHELL}' is required to run {}", script.display()))
}
