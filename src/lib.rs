//! Create a single Docker image from an OVXR EFT release.
//!
//! A release ships an installer ISO tar (`8000-2512-iso-eft15.1.tar`) and one
//! prebaked image tar per platform (`8000-2512-f-8101-image-eft15.1.tar`).
//! This crate unpacks both, works out the platform the image is for, and
//! hands the ISO to the release's `bake-and-build.sh`, which produces the
//! Docker image tar.
//!
//! - **Resolution** - find the ISO tar that belongs to an image tar
//! - **Platform inference** - archive name first, then the extracted qcow2
//! - **Extraction** - plain, gzip and zstd tars into a scratch directory
//! - **Build** - run `bake-and-build.sh`, streaming its output to a log
//! - **Reporting** - drop folder cleanup and the saved image path
//!
//! # Architecture
//!
//! ```text
//! create-single-docker (bin)
//!     │
//!     ├── cli: easy mode (image tar) or power user mode (both tars)
//!     └── Workflow::run(RunRequest) -> RunOutcome
//!             │
//!             ├── resolve, preflight, extract, platform, version
//!             ├── runlog: <output_root>/<timestamp>-<sdk>-<platform>/
//!             ├── build_script: bash bake-and-build.sh ...
//!             └── drop_folders, report, run_manifest
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use ovxr_docker::{ArchivePair, RunRequest, ToolConfig, Workflow};
//!
//! let config = ToolConfig::load(None)?;
//! let archives = ArchivePair::explicit(
//!     "8000-2512-iso-eft15.1.tar",
//!     "8000-2512-f-8101-image-eft15.1.tar",
//! );
//! let outcome = Workflow::new(config).run(RunRequest::new(archives));
//! std::process::exit(outcome.exit_code);
//! ```

pub mod build_script;
pub mod config;
pub mod drop_folders;
pub mod extract;
pub mod platform;
pub mod preflight;
pub mod report;
pub mod resolve;
pub mod run_manifest;
pub mod runlog;
pub mod version;
pub mod workflow;

pub use build_script::{BuildRun, BuildScriptCommand, TargetProfile};
pub use config::ToolConfig;
pub use platform::{Platform, PlatformOrigin};
pub use resolve::ArchivePair;
pub use runlog::RunLog;
pub use version::{BuildVersionSource, PinnedVersion};
pub use workflow::{RunOutcome, RunRequest, Workflow};
