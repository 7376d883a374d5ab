//! Archive pair resolution.
//!
//! In easy mode only the prebaked image tar is given and the ISO tar is found
//! next to it by naming convention:
//!
//! ```text
//! 8000-2512-f-8101-image-eft15.1.tar  -> 8000-2512-iso-eft15.1.tar
//! 8000-2512-d-8808-images-eft15.1.tar -> 8000-2512-iso-eft15.1.tar
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use walkdir::WalkDir;

use crate::runlog::RunLog;

/// Image tar name shapes, tried in order. Group 1 is the release id, group 2
/// the EFT tag.
const IMAGE_TAR_PATTERNS: &[&str] = &[
    // fixed platform
    r"^(8000-\d+)-f-\d+(?:-[\w-]+)?-image-(eft[\d\.]+)\.tar$",
    // distributed platform
    r"^(8000-\d+)-d-\d+(?:-[\w-]+)?-images-(eft[\d\.]+)\.tar$",
    // either
    r"^(8000-\d+)-[fd]-\d+(?:-[\w-]+)?-images?-(eft[\d\.]+)\.tar$",
];

/// The two archives a run consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePair {
    pub iso_tar: PathBuf,
    pub image_tar: PathBuf,
}

impl ArchivePair {
    /// Power user mode: both paths given verbatim.
    pub fn explicit(iso_tar: impl Into<PathBuf>, image_tar: impl Into<PathBuf>) -> Self {
        Self {
            iso_tar: iso_tar.into(),
            image_tar: image_tar.into(),
        }
    }

    /// Easy mode: find the ISO tar that belongs to `image_tar`.
    pub fn discover(image_tar: &Path, log: &RunLog) -> Result<Self> {
        let Some(iso_tar) = find_iso_tar_for_image_tar(image_tar, log) else {
            bail!(
                "could not find the ISO tar matching '{}'",
                image_tar.display()
            );
        };
        Ok(Self {
            iso_tar,
            image_tar: image_tar.to_path_buf(),
        })
    }

    /// Both archives must exist; paths are made absolute.
    pub fn validated(self) -> Result<Self> {
        if !self.iso_tar.exists() {
            bail!("ISO tar file not found: {}", self.iso_tar.display());
        }
        if !self.image_tar.exists() {
            bail!("Image tar file not found: {}", self.image_tar.display());
        }
        Ok(Self {
            iso_tar: absolute(&self.iso_tar)?,
            image_tar: absolute(&self.image_tar)?,
        })
    }
}

/// Release id and EFT tag parsed from an image tar name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTag {
    pub release: String,
    pub eft: String,
}

impl ReleaseTag {
    pub fn parse(image_tar_name: &str) -> Option<Self> {
        image_tar_patterns().iter().find_map(|re| {
            let caps = re.captures(image_tar_name)?;
            Some(Self {
                release: caps.get(1)?.as_str().to_string(),
                eft: caps.get(2)?.as_str().to_string(),
            })
        })
    }

    /// `<release>-iso-<eft>.tar`
    pub fn iso_tar_name(&self) -> String {
        format!("{}-iso-{}.tar", self.release, self.eft)
    }
}

/// Locate the ISO tar for `image_tar`.
///
/// Tries the reconstructed name first, then any `*-iso-*.tar` sibling that
/// starts with the same release id.
pub fn find_iso_tar_for_image_tar(image_tar: &Path, log: &RunLog) -> Option<PathBuf> {
    let image_tar = absolute(image_tar).ok()?;
    let parent_dir = image_tar.parent()?;
    let filename = image_tar.file_name()?.to_str()?;
    log.debug(format!("Analyzing image tar filename: {filename}"));

    let Some(tag) = ReleaseTag::parse(filename) else {
        log.warn(format!("Could not parse image tar filename pattern: {filename}"));
        return None;
    };
    log.debug(format!(
        "Matched pattern: base={}, eft={}",
        tag.release, tag.eft
    ));

    let expected_name = tag.iso_tar_name();
    let expected = parent_dir.join(&expected_name);
    log.info(format!("Looking for ISO tar file: {expected_name}"));
    if expected.exists() {
        log.info(format!("Found ISO tar file: {}", expected.display()));
        return Some(expected);
    }
    log.warn(format!("ISO tar file not found: {}", expected.display()));

    let candidates = iso_tar_candidates(parent_dir);
    if candidates.is_empty() {
        log.warn(format!(
            "No ISO tar files found in directory: {}",
            parent_dir.display()
        ));
        return None;
    }
    log.info(format!(
        "Found alternative ISO tar files in directory: {:?}",
        file_names(&candidates)
    ));

    if let Some(found) = candidates.iter().find(|candidate| {
        candidate
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(&tag.release))
    }) {
        log.info(format!("Using alternative ISO tar file: {}", found.display()));
        return Some(found.clone());
    }

    log.warn(format!(
        "No exact match found. Available ISO files: {:?}",
        file_names(&candidates)
    ));
    None
}

/// Files named `*-iso-*.tar` directly inside `dir`, sorted by name.
pub fn iso_tar_candidates(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(is_iso_tar_name)
        })
        .map(|entry| entry.into_path())
        .collect()
}

fn is_iso_tar_name(name: &str) -> bool {
    name.strip_suffix(".tar")
        .is_some_and(|stem| stem.contains("-iso-"))
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

/// `path` joined onto the current directory when relative.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("resolving current directory")?;
    Ok(cwd.join(path))
}

fn image_tar_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        IMAGE_TAR_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("static regex must compile"))
            .collect()
    })
}
