//! Cleanup of the scratch folders the build script announces.
//!
//! The script prints `IMG_DROP_FOLDER: <dir>` and `YAML_DROP_FOLDER: <dir>`
//! for directories it leaves behind. Only the first announcement of each
//! marker counts.

use std::fs;
use std::path::{Path, PathBuf};

use crate::runlog::RunLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropMarker {
    Image,
    Yaml,
}

impl DropMarker {
    pub const ALL: [DropMarker; 2] = [DropMarker::Image, DropMarker::Yaml];

    /// The label as printed by the script, without the trailing colon.
    pub fn label(self) -> &'static str {
        match self {
            DropMarker::Image => "IMG_DROP_FOLDER",
            DropMarker::Yaml => "YAML_DROP_FOLDER",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            DropMarker::Image => "IMG_DROP_FOLDER:",
            DropMarker::Yaml => "YAML_DROP_FOLDER:",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropCleanup {
    /// Directory was deleted.
    Removed(PathBuf),
    /// Announced path is not an existing directory.
    Missing(PathBuf),
    /// Deletion was attempted and failed.
    Failed(PathBuf),
    /// The script never printed the marker.
    NotAnnounced,
}

impl DropCleanup {
    pub fn removed(&self) -> bool {
        matches!(self, DropCleanup::Removed(_))
    }
}

/// Path announced by the first line starting with `marker`.
///
/// Lines are matched after trimming surrounding whitespace; matching is
/// case-sensitive.
pub fn find_sentinel(output: &str, marker: DropMarker) -> Option<PathBuf> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with(marker.prefix()))
        .and_then(|line| line.split_once(':'))
        .map(|(_, rest)| PathBuf::from(rest.trim()))
}

/// Delete the directory announced for `marker`, if any.
///
/// Never fails the run; the outcome is logged and returned.
pub fn cleanup_drop_folder(output: &str, marker: DropMarker, log: &RunLog) -> DropCleanup {
    let label = marker.label();
    let Some(dir) = find_sentinel(output, marker) else {
        log.info(format!("No {label} found to clean up"));
        return DropCleanup::NotAnnounced;
    };

    if !is_existing_dir(&dir) {
        log.warn(format!(
            "{label} does not exist or is not a directory: {}",
            dir.display()
        ));
        return DropCleanup::Missing(dir);
    }

    log.debug(format!("Cleaning up {label}: {}", dir.display()));
    match fs::remove_dir_all(&dir) {
        Ok(()) => {
            log.info(format!("Successfully removed {label}: {}", dir.display()));
            DropCleanup::Removed(dir)
        }
        Err(e) => {
            log.warn(format!("Failed to remove {label} {}: {e}", dir.display()));
            DropCleanup::Failed(dir)
        }
    }
}

/// Run cleanup for every marker, in announcement-independent order.
pub fn cleanup_all(output: &str, log: &RunLog) -> Vec<(DropMarker, DropCleanup)> {
    DropMarker::ALL
        .into_iter()
        .map(|marker| {
            let outcome = cleanup_drop_folder(output, marker, log);
            if outcome.removed() {
                log.info(format!("Cleaned up {}", marker.label()));
            }
            (marker, outcome)
        })
        .collect()
}

fn is_existing_dir(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
