//! Running `bake-and-build.sh`.
//!
//! The script's stdout and stderr are merged line by line, appended to
//! `bake-and-build.log` as they arrive (so `tail -f` follows the build), and
//! collected for the post-build scans.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;

use anyhow::{Context, Result};

use crate::preflight::BUILD_SHELL;
use crate::runlog::{iso_timestamp, RunLog};

/// Lines of output echoed when the script fails.
pub const FAILURE_TAIL_LINES: usize = 10;

/// Emulator environment the image is baked for (`-t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TargetProfile {
    #[default]
    All,
    Kne,
    Clab,
    Cml,
    #[value(name = "eve_ng")]
    EveNg,
    Crystalnet,
    Azure,
    Cloudvm,
}

impl TargetProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetProfile::All => "all",
            TargetProfile::Kne => "kne",
            TargetProfile::Clab => "clab",
            TargetProfile::Cml => "cml",
            TargetProfile::EveNg => "eve_ng",
            TargetProfile::Crystalnet => "crystalnet",
            TargetProfile::Azure => "azure",
            TargetProfile::Cloudvm => "cloudvm",
        }
    }
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved build script invocation.
#[derive(Debug, Clone)]
pub struct BuildScriptCommand {
    pub script: PathBuf,
    pub installer_image: PathBuf,
    pub platform: String,
    pub target: TargetProfile,
    pub docker_name: Option<String>,
    pub sdk_version: Option<String>,
}

impl BuildScriptCommand {
    /// Arguments after the shell: `<script> -i <iso> -p <platform> -t <target>
    /// [-d <name>] [--forcesdk <version>]`.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.script.display().to_string(),
            "-i".to_string(),
            self.installer_image.display().to_string(),
            "-p".to_string(),
            self.platform.clone(),
            "-t".to_string(),
            self.target.as_str().to_string(),
        ];
        if let Some(name) = &self.docker_name {
            args.push("-d".to_string());
            args.push(name.clone());
        }
        if let Some(version) = &self.sdk_version {
            args.push("--forcesdk".to_string());
            args.push(version.clone());
        }
        args
    }

    /// Full argv, shell included, for logging.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![BUILD_SHELL.to_string()];
        argv.extend(self.args());
        argv
    }

    /// The script runs from its own directory so its relative paths resolve.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(BUILD_SHELL);
        cmd.args(self.args());
        if let Some(dir) = self.script.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Outcome of one build script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRun {
    pub exit_code: i32,
    /// Merged output, newline separated.
    pub output: String,
}

impl BuildRun {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run the script, streaming its merged output into `build_log`.
///
/// Supervision failures (spawn errors, lost pipes) become exit code 1 with the
/// error as the output; they are never returned as `Err`.
pub fn run_streaming(
    command: &BuildScriptCommand,
    build_log: Option<&Path>,
    log: &RunLog,
) -> BuildRun {
    let mut sink = build_log.and_then(|path| BuildLogSink::create(path, command, log));

    match supervise(command, sink.as_mut()) {
        Ok((exit_code, lines)) => {
            if let Some(sink) = sink.as_mut() {
                sink.footer(exit_code);
            }
            if exit_code == 0 {
                log.info("bake-and-build.sh completed successfully");
            } else {
                log.error(format!("bake-and-build.sh failed with exit code {exit_code}"));
                if !lines.is_empty() {
                    println!("Last few lines of output:");
                    for line in failure_tail(&lines) {
                        println!("{line}");
                    }
                }
            }
            BuildRun {
                exit_code,
                output: lines.join("\n"),
            }
        }
        Err(e) => {
            log.error(format!("Error executing bake-and-build.sh: {e:#}"));
            if let Some(sink) = sink.as_mut() {
                sink.error_block(&e);
            }
            BuildRun {
                exit_code: 1,
                output: format!("Error occurred during execution: {e:#}"),
            }
        }
    }
}

/// The trailing output echoed to the console after a failed run.
fn failure_tail(lines: &[String]) -> &[String] {
    &lines[lines.len().saturating_sub(FAILURE_TAIL_LINES)..]
}

// stdin is inherited; only stdout and stderr are captured.
fn supervise(
    command: &BuildScriptCommand,
    mut sink: Option<&mut BuildLogSink<'_>>,
) -> Result<(i32, Vec<String>)> {
    let mut child = command
        .to_command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn {}", command.script.display()))?;

    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let stderr = child.stderr.take().context("Failed to capture stderr")?;

    let (tx, rx) = mpsc::channel();
    let readers = [spawn_reader(stdout, tx.clone()), spawn_reader(stderr, tx)];

    let mut lines = Vec::new();
    // Ends once both pipes close.
    for line in rx {
        if let Some(sink) = sink.as_deref_mut() {
            sink.line(&line);
        }
        lines.push(line);
    }
    for reader in readers {
        let _ = reader.join();
    }

    let status = child.wait().context("Failed waiting for bake-and-build.sh")?;
    Ok((status.code().unwrap_or(1), lines))
}

fn spawn_reader<R>(pipe: R, tx: Sender<String>) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// `bake-and-build.log` writer. Write failures are logged once and then
/// ignored so the build keeps running.
struct BuildLogSink<'a> {
    file: File,
    log: &'a RunLog,
    failed: bool,
}

impl<'a> BuildLogSink<'a> {
    fn create(path: &Path, command: &BuildScriptCommand, log: &'a RunLog) -> Option<Self> {
        let opened = File::create(path).and_then(|mut file| {
            write!(
                file,
                "=== bake-and-build.sh Output ===\n\
                 Timestamp: {}\n\
                 Command: {}\n\
                 \n=== Live Output ===\n",
                iso_timestamp(),
                command.argv().join(" ")
            )?;
            file.flush()?;
            Ok(file)
        });
        match opened {
            Ok(file) => Some(Self {
                file,
                log,
                failed: false,
            }),
            Err(e) => {
                log.warn(format!("Failed to initialize bake-and-build.sh log file: {e}"));
                None
            }
        }
    }

    fn line(&mut self, line: &str) {
        let written = writeln!(self.file, "{line}").and_then(|()| self.file.flush());
        if let Err(e) = written {
            if !self.failed {
                self.log.warn(format!("Failed to write to bake-and-build.sh log: {e}"));
                self.failed = true;
            }
        }
    }

    fn footer(&mut self, exit_code: i32) {
        let written = write!(
            self.file,
            "\n=== Execution Completed ===\n\
             Exit code: {exit_code}\n\
             Completed at: {}\n",
            iso_timestamp()
        )
        .and_then(|()| self.file.flush());
        if let Err(e) = written {
            self.log.warn(format!("Failed to finalize bake-and-build.sh log: {e}"));
        }
    }

    fn error_block(&mut self, error: &anyhow::Error) {
        let _ = write!(
            self.file,
            "\n=== ERROR ===\n\
             Error: {error:#}\n\
             Error occurred at: {}\n",
            iso_timestamp()
        )
        .and_then(|()| self.file.flush());
    }
}
