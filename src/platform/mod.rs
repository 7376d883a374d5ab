//! Platform inference.
//!
//! The platform handed to `bake-and-build.sh` is worked out in two stages:
//!
//! 1. [`from_archive_name`] reads the prebaked image tar filename
//!    (`8000-2512-f-8101-image-eft15.1.tar` -> `8101-32H`).
//! 2. [`from_disk_image_name`] reads the first qcow2 found inside that tar
//!    (`8101-32FH-x64-25.1.2.qcow2` -> `8101-32FH`) and, when it resolves,
//!    replaces the stage 1 guess.
//!
//! Neither stage fails; stage 1 falls back to [`DEFAULT_PLATFORM`].

pub mod tables;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

pub use tables::{platform_for_code, PLATFORM_MAPPING, QCOW2_TO_PLATFORM};

/// Used when nothing in the archive name identifies a platform.
pub const DEFAULT_PLATFORM: &str = "8201-32FH";

/// Extension of the disk images shipped in prebaked image tars.
pub const DISK_IMAGE_EXTENSION: &str = "qcow2";

/// Where the current platform value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformOrigin {
    /// Given with `--platform`.
    Explicit,
    /// Inferred from the image tar filename, or defaulted.
    ArchiveName,
    /// Refined from an extracted disk image filename.
    DiskImage,
}

/// The platform for one run together with how it was chosen.
///
/// Values only move towards more specific origins: an archive-name guess can
/// be refined from a disk image, an explicit value is never replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    value: String,
    origin: PlatformOrigin,
}

impl Platform {
    pub fn explicit(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            origin: PlatformOrigin::Explicit,
        }
    }

    /// Stage 1: infer from the image tar filename.
    pub fn from_archive(archive_name: &str) -> Self {
        Self {
            value: from_archive_name(archive_name),
            origin: PlatformOrigin::ArchiveName,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn origin(&self) -> PlatformOrigin {
        self.origin
    }

    /// Stage 2: refine from extracted files.
    ///
    /// Returns the disk image that drove the refinement when the value
    /// changed origin. The refined value replaces the guess even when it
    /// happens to be shorter.
    pub fn refine_from_extracted(&mut self, extracted: &[PathBuf]) -> Option<PathBuf> {
        if self.origin == PlatformOrigin::Explicit {
            return None;
        }
        let disk_image = first_disk_image(extracted)?;
        let name = disk_image.file_name()?.to_str()?;
        let refined = from_disk_image_name(name)?;
        self.value = refined;
        self.origin = PlatformOrigin::DiskImage;
        Some(disk_image.to_path_buf())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Infer a platform from an image tar filename, falling back to
/// [`DEFAULT_PLATFORM`].
pub fn from_archive_name(filename: &str) -> String {
    try_from_archive_name(filename).unwrap_or_else(|| DEFAULT_PLATFORM.to_string())
}

/// Infer a platform from an image tar filename.
///
/// Order of strategies:
/// - segment after a `d` marker (distributed), table hit only
/// - segment after an `f` marker (fixed), then its base before the first `-`
/// - literal `ncs1010`
/// - first 4-digit numeric segment starting with `8`, mapped or raw
pub fn try_from_archive_name(filename: &str) -> Option<String> {
    let parts: Vec<&str> = filename.split('-').collect();

    if let Some(code) = segment_after(&parts, "d") {
        if let Some(platform) = platform_for_code(code) {
            return Some(platform.to_string());
        }
    }

    if let Some(code) = segment_after(&parts, "f") {
        if let Some(platform) = platform_for_code(code) {
            return Some(platform.to_string());
        }
        let base = code.split('-').next().unwrap_or(code);
        if let Some(platform) = platform_for_code(base) {
            return Some(platform.to_string());
        }
    }

    if filename.contains("ncs1010") {
        return Some("ncs1010".to_string());
    }

    parts
        .iter()
        .find(|part| is_platform_number(part))
        .map(|part| platform_for_code(part).unwrap_or(part).to_string())
}

/// Resolve a platform from a disk image filename such as
/// `8101-32FH-x64-25.1.2.qcow2`.
pub fn from_disk_image_name(filename: &str) -> Option<String> {
    let stem = disk_image_stem(filename);

    if let Some(platform) = tables::lookup(QCOW2_TO_PLATFORM, &stem) {
        return Some(platform.to_string());
    }

    if let Some((_, platform)) = QCOW2_TO_PLATFORM
        .iter()
        .find(|(pattern, _)| pattern.replace("-x64", "") == stem)
    {
        return Some(platform.to_string());
    }

    let base = leading_platform_number(&stem)?;
    Some(platform_for_code(base).unwrap_or(base).to_string())
}

/// First extracted file carrying the disk image extension.
pub fn first_disk_image(extracted: &[PathBuf]) -> Option<&Path> {
    extracted
        .iter()
        .find(|path| has_extension(path, DISK_IMAGE_EXTENSION))
        .map(PathBuf::as_path)
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn segment_after<'a>(parts: &[&'a str], marker: &str) -> Option<&'a str> {
    let index = parts.iter().position(|part| *part == marker)?;
    parts.get(index + 1).copied()
}

fn is_platform_number(part: &str) -> bool {
    part.len() == 4 && part.starts_with('8') && part.chars().all(|c| c.is_ascii_digit())
}

fn leading_platform_number(stem: &str) -> Option<&str> {
    let head = stem.get(..4)?;
    head.chars().all(|c| c.is_ascii_digit()).then_some(head)
}

fn disk_image_stem(filename: &str) -> String {
    let without_ext = match filename.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case(DISK_IMAGE_EXTENSION) => stem,
        _ => filename,
    };
    version_suffix().replace(without_ext, "").into_owned()
}

fn version_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"-x64-\d+\.\d+\.\d+$|-\d+\.\d+\.\d+$").expect("static regex must compile")
    })
}
