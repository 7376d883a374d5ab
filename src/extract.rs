//! Tar extraction into the run's scratch directory.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;

use crate::platform::has_extension;
use crate::runlog::RunLog;

/// Extension of the installer image inside the ISO tar.
pub const INSTALLER_IMAGE_EXTENSION: &str = "iso";

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Unpack `archive` into `dest`, returning every member path in archive order.
///
/// Plain, gzip and zstd compressed tars are accepted. `dest` is created if
/// needed and returned paths are rooted at it.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    unpack(archive, dest).with_context(|| format!("Failed to extract {}", archive.display()))
}

fn unpack(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dest)
        .with_context(|| format!("creating extraction directory '{}'", dest.display()))?;

    let reader = open_decompressed(archive)?;
    let mut tar = tar::Archive::new(reader);
    tar.set_preserve_permissions(true);

    let mut extracted = Vec::new();
    for entry in tar.entries().context("reading tar entries")? {
        let mut entry = entry.context("reading tar entry")?;
        let member = entry.path().context("decoding tar member path")?.into_owned();
        let written = entry
            .unpack_in(dest)
            .with_context(|| format!("writing member '{}'", member.display()))?;
        if written {
            extracted.push(dest.join(&member));
        }
    }
    Ok(extracted)
}

fn open_decompressed(archive: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(archive)
        .with_context(|| format!("opening archive '{}'", archive.display()))?;
    let mut reader = BufReader::new(file);
    let head = reader
        .fill_buf()
        .with_context(|| format!("reading archive header '{}'", archive.display()))?;
    let is_zstd = head.starts_with(&ZSTD_MAGIC);
    let is_gzip = head.starts_with(&GZIP_MAGIC);

    if is_zstd {
        let decoder = zstd::stream::Decoder::with_buffer(reader)?;
        return Ok(Box::new(decoder));
    }
    if is_gzip {
        return Ok(Box::new(GzDecoder::new(reader)));
    }
    Ok(Box::new(reader))
}

/// Pick the installer image among extracted files.
///
/// With several candidates the first in archive order wins.
pub fn find_installer_image(extracted: &[PathBuf], log: &RunLog) -> Result<PathBuf> {
    let images: Vec<&PathBuf> = extracted
        .iter()
        .filter(|path| has_extension(path, INSTALLER_IMAGE_EXTENSION))
        .collect();

    let Some(first) = images.first() else {
        bail!("No ISO file found in extracted files");
    };
    if images.len() > 1 {
        log.warn(format!(
            "Multiple ISO files found, using first: {}",
            first.display()
        ));
    }
    Ok((*first).clone())
}
