//! Per-run logging.
//!
//! [`RunLog`] is the sink every stage writes through. Records always go to
//! the `log` facade (console); once [`RunLog::attach`] has been called they are
//! also appended to the run's `create_single_docker.log`. Each run owns its
//! own sink, so two runs in one process never share a log file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{Level, LevelFilter};
use time::OffsetDateTime;

/// Directory (under the current working directory) holding per-run logs.
pub const DEFAULT_OUTPUT_DIR: &str = "ovxr-docker.out";
pub const RUN_LOG_FILENAME: &str = "create_single_docker.log";
pub const BUILD_LOG_FILENAME: &str = "bake-and-build.log";
pub const RUN_MANIFEST_FILENAME: &str = "run-manifest.json";

/// Log sink for one run.
#[derive(Debug)]
pub struct RunLog {
    file: Option<PathBuf>,
    file_level: LevelFilter,
}

impl Default for RunLog {
    fn default() -> Self {
        Self::console()
    }
}

impl RunLog {
    /// A sink that only writes to the console.
    pub fn console() -> Self {
        Self {
            file: None,
            file_level: LevelFilter::Info,
        }
    }

    /// Also mirror debug records into the run log file.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.file_level = if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        self
    }

    /// Start mirroring records to `path`, truncating it and writing `header`.
    pub fn attach(&mut self, path: &Path, header: &RunHeader) -> Result<()> {
        fs::write(path, header.render())
            .with_context(|| format!("writing run log header '{}'", path.display()))?;
        self.file = Some(path.to_path_buf());
        Ok(())
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.record(Level::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.record(Level::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.record(Level::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.record(Level::Error, message.as_ref());
    }

    /// Append a line to the run log file only, bypassing the console.
    pub fn file_only(&self, message: impl AsRef<str>) {
        self.append(Level::Info, message.as_ref());
    }

    fn record(&self, level: Level, message: &str) {
        log::log!(level, "{message}");
        if level <= self.file_level {
            self.append(level, message);
        }
    }

    fn append(&self, level: Level, message: &str) {
        let Some(path) = &self.file else {
            return;
        };
        // Logging must never break the run.
        let _ = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| writeln!(f, "[{}] {}: {}", display_timestamp(), level, message));
    }
}

/// Run parameters written at the top of the run log.
#[derive(Debug, Clone)]
pub struct RunHeader {
    pub iso_tar: PathBuf,
    pub image_tar: PathBuf,
    pub platform: String,
    pub sdk_version: Option<String>,
    pub docker_name: Option<String>,
    pub target: String,
}

impl RunHeader {
    fn render(&self) -> String {
        format!(
            "=== create_single_docker Run Log ===\n\
             Timestamp: {}\n\
             ISO tar: {}\n\
             Image tar: {}\n\
             Platform: {}\n\
             SDK Version: {}\n\
             Docker name: {}\n\
             Target: {}\n\
             \n=== Execution Log ===\n",
            iso_timestamp(),
            self.iso_tar.display(),
            self.image_tar.display(),
            self.platform,
            self.sdk_version.as_deref().unwrap_or("unknown"),
            self.docker_name.as_deref().unwrap_or("auto-generated"),
            self.target,
        )
    }
}

/// Files making up one run's log directory:
/// `<output_root>/<timestamp>-<sdk>-<platform>/`.
#[derive(Debug, Clone)]
pub struct LogLayout {
    pub dir: PathBuf,
    pub run_log: PathBuf,
    pub build_log: PathBuf,
    pub manifest: PathBuf,
}

impl LogLayout {
    pub fn create(output_root: &Path, sdk_version: Option<&str>, platform: &str) -> Result<Self> {
        let dir_name = format!(
            "{}-{}-{}",
            compact_timestamp(),
            sdk_version.unwrap_or("unknown"),
            platform
        );
        let dir = output_root.join(dir_name);
        fs::create_dir_all(&dir).with_context(|| {
            format!(
                "creating logging directory '{}'; check write permissions and free disk space",
                dir.display()
            )
        })?;
        Ok(Self {
            run_log: dir.join(RUN_LOG_FILENAME),
            build_log: dir.join(BUILD_LOG_FILENAME),
            manifest: dir.join(RUN_MANIFEST_FILENAME),
            dir,
        })
    }

    /// The directory name doubles as the run id.
    pub fn run_id(&self) -> String {
        self.dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// `20251016_142501`
pub fn compact_timestamp() -> String {
    format_now("", "_", "", "")
}

/// `2025-10-16 14:25:01`
pub fn display_timestamp() -> String {
    format_now("-", " ", ":", "")
}

/// `2025-10-16T14:25:01Z`
pub fn iso_timestamp() -> String {
    format_now("-", "T", ":", "Z")
}

fn format_now(date_sep: &str, between: &str, time_sep: &str, suffix: &str) -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{date_sep}{:02}{date_sep}{:02}{between}{:02}{time_sep}{:02}{time_sep}{:02}{suffix}",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
