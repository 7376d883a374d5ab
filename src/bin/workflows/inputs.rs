use std::path::Path;

use ovxr_docker::resolve::iso_tar_candidates;
use ovxr_docker::{ArchivePair, RunLog};

use super::cli::{Cli, PROGRAM};

/// How the archive pair was given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputMode {
    /// Image tar only; ISO tar discovered next to it.
    Easy,
    /// Both `--iso-tar` and `--image-tar`.
    PowerUser,
}

/// Resolve the archive pair from the command line, printing usage
/// diagnostics when neither mode applies.
pub(crate) fn resolve_archives(cli: &Cli, log: &RunLog) -> Option<(InputMode, ArchivePair)> {
    if let Some(image_tar) = &cli.image_tar {
        log.info("Running in EASY MODE - image tar provided as positional argument");
        log.info("Auto-discovering ISO tar file...");

        let Ok(pair) = ArchivePair::discover(image_tar, log) else {
            easy_mode_failed(image_tar, log);
            return None;
        };
        if cli.iso_tar.is_some() {
            log.warn("Both positional image tar and --iso-tar provided. Using auto-discovered ISO tar.");
        }
        return Some((InputMode::Easy, pair));
    }

    if let (Some(iso_tar), Some(image_tar)) = (&cli.iso_tar, &cli.image_tar_flag) {
        log.info("Running in POWER USER MODE - both --iso-tar and --image-tar provided");
        return Some((InputMode::PowerUser, ArchivePair::explicit(iso_tar, image_tar)));
    }

    insufficient_arguments(log);
    None
}

fn easy_mode_failed(image_tar: &Path, log: &RunLog) {
    log.error("EASY MODE FAILED: Could not find corresponding ISO tar file");
    log.error("");
    log.error("SOLUTION OPTIONS:");
    log.error("1. Make sure the ISO tar file is in the same directory as the image tar file");
    log.error("2. Use POWER USER MODE instead:");
    log.error(format!(
        "   {PROGRAM} --iso-tar <iso_file.tar> --image-tar {}",
        image_tar.display()
    ));
    log.error("");

    let dir = image_tar
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let candidates = iso_tar_candidates(dir);
    if candidates.is_empty() {
        log.error("No ISO tar files found in the same directory");
        return;
    }
    log.error("Available ISO tar files in the same directory:");
    for candidate in candidates {
        if let Some(name) = candidate.file_name() {
            log.error(format!("   - {}", name.to_string_lossy()));
        }
    }
}

fn insufficient_arguments(log: &RunLog) {
    log.error("ERROR: Insufficient arguments provided");
    log.error("");
    log.error("Choose one of these modes:");
    log.error("");
    log.error("EASY MODE (recommended):");
    log.error(format!("   {PROGRAM} <path_to_image_tar_file>"));
    log.error(format!(
        "   Example: {PROGRAM} /path/to/8000-2512-f-8101-image-eft15.1.tar"
    ));
    log.error("");
    log.error("POWER USER MODE:");
    log.error(format!("   {PROGRAM} --iso-tar <iso_file> --image-tar <image_file>"));
    log.error(format!(
        "   Example: {PROGRAM} --iso-tar iso.tar --image-tar image.tar"
    ));
    log.error("");
}
