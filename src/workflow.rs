//! The create-single-docker run, stage by stage.
//!
//! ```text
//! validate inputs -> required files -> scratch dir -> extract ISO tar
//!   -> extract image tar -> refine platform -> locate ISO -> SDK version
//!   -> log directory -> bake-and-build.sh -> drop folders -> docker image
//! ```
//!
//! Any stage error ends the run with exit code 1. Build failures and a
//! missing docker image are reported the same way but still go through drop
//! folder cleanup and final logging. The scratch directory is removed last
//! whenever cleanup is enabled.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::build_script::{run_streaming, BuildScriptCommand, TargetProfile};
use crate::config::ToolConfig;
use crate::drop_folders::cleanup_all;
use crate::extract::{extract_archive, find_installer_image};
use crate::platform::Platform;
use crate::preflight::{check_build_script, check_required_files};
use crate::report::docker_image_path;
use crate::resolve::{absolute, ArchivePair};
use crate::run_manifest::RunManifest;
use crate::runlog::{LogLayout, RunHeader, RunLog};
use crate::version::{BuildVersionSource, PinnedVersion};

/// Environments the produced image can be loaded into.
pub const SUPPORTED_ENVIRONMENTS: &[&str] = &["CML", "KNE", "CLAB"];

/// Prefix of the scratch directory created under the system temp dir.
pub const SCRATCH_PREFIX: &str = "create_single_docker_";

const BANNER_WIDTH: usize = 80;

/// Everything the user asked for on the command line.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub archives: ArchivePair,
    /// `--platform`; inferred from the image tar name when absent.
    pub platform: Option<String>,
    pub docker_name: Option<String>,
    pub target: TargetProfile,
    pub cleanup: bool,
    pub temp_dir: Option<PathBuf>,
    pub verbose: bool,
}

impl RunRequest {
    pub fn new(archives: ArchivePair) -> Self {
        Self {
            archives,
            platform: None,
            docker_name: None,
            target: TargetProfile::default(),
            cleanup: true,
            temp_dir: None,
            verbose: false,
        }
    }

    fn initial_platform(&self) -> Platform {
        match &self.platform {
            Some(code) => Platform::explicit(code.clone()),
            None => {
                let name = self
                    .archives
                    .image_tar
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Platform::from_archive(&name)
            }
        }
    }
}

/// What a finished run reports back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub platform: String,
    pub sdk_version: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub docker_image: Option<PathBuf>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub struct Workflow {
    config: ToolConfig,
    version_source: Box<dyn BuildVersionSource>,
}

impl Workflow {
    pub fn new(config: ToolConfig) -> Self {
        let version = config.sdk_version.clone().unwrap_or_default();
        Self {
            config,
            version_source: Box::new(PinnedVersion::new(version)),
        }
    }

    /// Replace the SDK version strategy.
    pub fn with_version_source(mut self, source: Box<dyn BuildVersionSource>) -> Self {
        self.version_source = source;
        self
    }

    pub fn run(&self, request: RunRequest) -> RunOutcome {
        let mut ctx = RunContext::new(request);

        banner(
            &ctx.log,
            &[
                "OVXR Docker Image Creator - Starting Workflow".to_string(),
                "Using an ISO & Prebaked Platform's Tar file (provided in OVXR's EFT releases), \
                 this will create a single Docker image suitable for use in:"
                    .to_string(),
                SUPPORTED_ENVIRONMENTS.join(", "),
            ],
        );
        ctx.log.info("Starting create_single_docker workflow");

        let exit_code = match self.execute(&mut ctx) {
            Ok(code) => code,
            Err(e) => {
                ctx.log.error(format!("Create single docker error: {e:#}"));
                let mut lines = vec![
                    "OVXR Docker Image Creator - Workflow Failed".to_string(),
                    format!("Error: {e:#}"),
                ];
                if let Some(layout) = &ctx.layout {
                    lines.push(format!(
                        "Partial logs may be available at: {}",
                        layout.dir.display()
                    ));
                }
                banner(&ctx.log, &lines);
                1
            }
        };

        ctx.finish_manifest(exit_code);
        ctx.cleanup_scratch();

        RunOutcome {
            exit_code,
            platform: ctx.platform.as_str().to_string(),
            sdk_version: ctx.sdk_version,
            log_dir: ctx.layout.map(|l| l.dir),
            scratch_dir: ctx.scratch,
            docker_image: ctx.docker_image,
        }
    }

    fn execute(&self, ctx: &mut RunContext) -> Result<i32> {
        let archives = ctx.request.archives.clone().validated()?;
        ctx.log.info(format!("ISO tar: {}", archives.iso_tar.display()));
        ctx.log.info(format!("Image tar: {}", archives.image_tar.display()));
        ctx.log.info(format!("Platform: {}", ctx.platform));
        ctx.request.archives = archives;

        let checked = check_required_files(&self.config.required_files, &self.config.release_root)?;
        ctx.log.debug(format!(
            "Initial file check passed: {checked} files present under {}",
            self.config.release_root.display()
        ));
        let shell = check_build_script(&self.config.bake_script)?;
        ctx.log.debug(format!("Using shell {}", shell.display()));

        let scratch = ctx.create_scratch()?;

        ctx.log.debug("Extracting ISO tar file...");
        let iso_files = extract_archive(&ctx.request.archives.iso_tar, &scratch)?;
        ctx.log.debug(format!("Extracted {} files", iso_files.len()));

        ctx.log.debug("Extracting image tar file...");
        let image_files = extract_archive(&ctx.request.archives.image_tar, &scratch)?;
        ctx.log.debug(format!("Extracted {} files", image_files.len()));

        let guess = ctx.platform.as_str().to_string();
        if let Some(disk_image) = ctx.platform.refine_from_extracted(&image_files) {
            ctx.log.info(format!(
                "Refined platform from {}: {guess} -> {}",
                disk_image.display(),
                ctx.platform
            ));
        }

        let installer_image = find_installer_image(&iso_files, &ctx.log)?;
        ctx.log.info(format!("Found ISO file: {}", installer_image.display()));

        ctx.sdk_version = self.version_source.extract_build_version(&installer_image);
        match &ctx.sdk_version {
            Some(version) => ctx.log.info(format!("Using SDK version: {version}")),
            None => ctx
                .log
                .warn("SDK version not available, continuing without --forcesdk parameter"),
        }

        let build_log = ctx.open_log_dir(&self.config.output_root)?;

        let command = BuildScriptCommand {
            script: self.config.bake_script.clone(),
            installer_image,
            platform: ctx.platform.as_str().to_string(),
            target: ctx.request.target,
            docker_name: ctx.request.docker_name.clone(),
            sdk_version: ctx.sdk_version.clone(),
        };
        let argv = command.argv().join(" ");
        ctx.log.info(format!("Executing command:\n {argv}"));
        ctx.log.info(
            "Executing bake-and-build.sh - open a new shell and run the following command to see real-time output:",
        );
        ctx.log.info(format!("tail -f {}", build_log.display()));

        let run = run_streaming(&command, Some(&build_log), &ctx.log);

        ctx.log.file_only(format!("Command executed: {argv}"));
        ctx.log.file_only(format!("Exit code: {}", run.exit_code));
        ctx.log.info(format!(
            "bake-and-build.sh output was written in real-time to: {}",
            build_log.display()
        ));

        cleanup_all(&run.output, &ctx.log);

        let mut exit_code = run.exit_code;
        if run.success() {
            match docker_image_path(&run.output) {
                Some(reported) => {
                    let image = resolve_reported_image(&command, reported);
                    ctx.log.info(format!("Docker image saved to: {}", image.display()));
                    ctx.log.file_only(format!("Docker image path: {}", image.display()));
                    if !image.exists() {
                        ctx.log.error(format!(
                            "Docker image file not found at expected path: {}",
                            image.display()
                        ));
                        exit_code = 1;
                    }
                    ctx.docker_image = Some(image);
                }
                None => ctx
                    .log
                    .debug("No Docker image path found in bake-and-build.sh output"),
            }
        }

        ctx.report(exit_code);
        Ok(exit_code)
    }
}

/// The script reports paths relative to its own working directory.
fn resolve_reported_image(command: &BuildScriptCommand, reported: PathBuf) -> PathBuf {
    match command.script.parent() {
        Some(dir) if reported.is_relative() && !dir.as_os_str().is_empty() => dir.join(reported),
        _ => reported,
    }
}

/// State owned by one run.
struct RunContext {
    request: RunRequest,
    log: RunLog,
    platform: Platform,
    sdk_version: Option<String>,
    scratch: Option<PathBuf>,
    layout: Option<LogLayout>,
    manifest: Option<RunManifest>,
    docker_image: Option<PathBuf>,
}

impl RunContext {
    fn new(request: RunRequest) -> Self {
        Self {
            log: RunLog::console().verbose(request.verbose),
            platform: request.initial_platform(),
            request,
            sdk_version: None,
            scratch: None,
            layout: None,
            manifest: None,
            docker_image: None,
        }
    }

    fn create_scratch(&mut self) -> Result<PathBuf> {
        let dir = match &self.request.temp_dir {
            // Extracted paths are handed to a script running elsewhere.
            Some(dir) => {
                let dir = absolute(dir)?;
                fs::create_dir_all(&dir)
                    .with_context(|| format!("creating temp directory '{}'", dir.display()))?;
                dir
            }
            None => tempfile::Builder::new()
                .prefix(SCRATCH_PREFIX)
                .tempdir()
                .context("creating temp directory")?
                .keep(),
        };
        self.log.info(format!("Created temp iso directory: {}", dir.display()));
        self.scratch = Some(dir.clone());
        Ok(dir)
    }

    /// Create the log directory, attach the run log and record the run as
    /// started. Returns the build log path.
    fn open_log_dir(&mut self, output_root: &Path) -> Result<PathBuf> {
        let layout = LogLayout::create(
            output_root,
            self.sdk_version.as_deref(),
            self.platform.as_str(),
        )
        .context("Logging setup failed")?;
        self.log.info(format!("Created logging directory: {}", layout.dir.display()));

        let header = RunHeader {
            iso_tar: self.request.archives.iso_tar.clone(),
            image_tar: self.request.archives.image_tar.clone(),
            platform: self.platform.as_str().to_string(),
            sdk_version: self.sdk_version.clone(),
            docker_name: self.request.docker_name.clone(),
            target: self.request.target.to_string(),
        };
        self.log.attach(&layout.run_log, &header)?;
        self.log.info(format!("Log file path: {}", layout.run_log.display()));
        self.log.info(format!(
            "bake-and-build.sh log file path: {}",
            layout.build_log.display()
        ));

        let manifest = RunManifest::started(
            layout.run_id(),
            self.platform.as_str(),
            self.sdk_version.as_deref(),
            self.request.target.as_str(),
            self.request.docker_name.as_deref(),
        );
        if let Err(e) = manifest.write(&layout.manifest) {
            self.log.warn(format!("Failed to write run manifest: {e:#}"));
        }

        let build_log = layout.build_log.clone();
        self.manifest = Some(manifest);
        self.layout = Some(layout);
        Ok(build_log)
    }

    fn report(&self, exit_code: i32) {
        let log_dir = self
            .layout
            .as_ref()
            .map(|l| l.dir.display().to_string())
            .unwrap_or_default();

        if exit_code == 0 {
            let mut lines = vec![
                "OVXR Docker Image Creator - Workflow Completed Successfully!".to_string(),
                format!("Logs saved to: {log_dir}"),
            ];
            match &self.docker_image {
                Some(image) => {
                    lines.push(format!("Docker image created: {}", image.display()));
                    lines.push(format!("Run to load the image: docker load < {}", image.display()));
                }
                None => lines.push(
                    "Docker image creation finished. Check bake-and-build.sh output for image details."
                        .to_string(),
                ),
            }
            banner(&self.log, &lines);
        } else {
            banner(
                &self.log,
                &[
                    "OVXR Docker Image Creator - Workflow Completed with Errors".to_string(),
                    format!("Logs saved to: {log_dir}"),
                    format!("Check logs for error details. Exit code: {exit_code}"),
                ],
            );
        }
    }

    fn finish_manifest(&mut self, exit_code: i32) {
        let (Some(manifest), Some(layout)) = (self.manifest.as_mut(), self.layout.as_ref()) else {
            return;
        };
        manifest.finish(exit_code, self.docker_image.clone());
        if let Err(e) = manifest.write(&layout.manifest) {
            self.log.warn(format!("Failed to write run manifest: {e:#}"));
        }
    }

    fn cleanup_scratch(&self) {
        let Some(dir) = &self.scratch else {
            return;
        };
        if !self.request.cleanup {
            self.log.info(format!("Keeping temp iso directory: {}", dir.display()));
            return;
        }
        if !dir.exists() {
            return;
        }
        self.log.info(format!("Cleaning up temp iso directory: {}", dir.display()));
        if let Err(e) = fs::remove_dir_all(dir) {
            self.log.warn(format!(
                "Failed to remove temp iso directory {}: {e}",
                dir.display()
            ));
        }
    }
}

fn banner(log: &RunLog, lines: &[String]) {
    let rule = "=".repeat(BANNER_WIDTH);
    log.info(&rule);
    for line in lines {
        log.info(line);
    }
    log.info(&rule);
}
