use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;
use ovxr_docker::runlog::display_timestamp;
use ovxr_docker::TargetProfile;

pub(crate) const PROGRAM: &str = "create-single-docker";

const EXAMPLES: &str = "\
Examples:
  # Easy mode - just provide the image tar file (ISO tar auto-discovered):
  create-single-docker /path/to/8000-2512-f-8101-image-eft15.1.tar
  create-single-docker /path/to/8000-2512-d-8808-images-eft15.1.tar --docker-name my8808:latest

  # Power user mode - explicitly specify both files:
  create-single-docker --iso-tar 8000-2512-iso-eft15.1.tar --image-tar 8000-2512-f-8101-image-eft15.1.tar

  create-single-docker --iso-tar /path/to/8000-2512-iso-eft15.1.tar \\
                       --image-tar /path/to/8000-2512-f-8101-image-eft15.1.tar \\
                       --platform 8101-32H \\
                       --docker-name myimage:latest

  create-single-docker --iso-tar iso.tar --image-tar image.tar --no-cleanup --temp-dir /tmp/mydocker";

#[derive(Debug, Parser)]
#[command(name = PROGRAM)]
#[command(about = "Create a single Docker image from ISO and prebaked image tar files")]
#[command(after_help = EXAMPLES)]
pub(crate) struct Cli {
    /// Path to the prebaked image tar file (easy mode). The ISO tar is
    /// auto-discovered in the same directory.
    pub(crate) image_tar: Option<PathBuf>,

    /// Path to the ISO tar file (e.g. 8000-2512-iso-eft15.1.tar). Required in
    /// power user mode.
    #[arg(long)]
    pub(crate) iso_tar: Option<PathBuf>,

    /// Path to the prebaked image tar file (e.g.
    /// 8000-2512-f-8101-image-eft15.1.tar). Required in power user mode.
    #[arg(long = "image-tar", value_name = "IMAGE_TAR")]
    pub(crate) image_tar_flag: Option<PathBuf>,

    /// Platform identifier (e.g. 8101-32H, 8201-32FH, 8202-32FH-M). Detected
    /// from the tar filename and contents when not given.
    #[arg(long)]
    pub(crate) platform: Option<String>,

    /// Name for the resulting Docker image (e.g. myimage:latest).
    /// bake-and-build.sh picks one when not given.
    #[arg(long)]
    pub(crate) docker_name: Option<String>,

    #[arg(long, value_enum, default_value_t = TargetProfile::All, hide = true)]
    pub(crate) target: TargetProfile,

    /// Do not clean up temporary files after completion.
    #[arg(long)]
    pub(crate) no_cleanup: bool,

    /// Custom temporary directory path (system temp when not given).
    #[arg(long)]
    pub(crate) temp_dir: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub(crate) verbose: bool,

    /// Tool configuration file (TOML).
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
}

/// Console logging: `<timestamp> - <LEVEL> - <message>`. `RUST_LOG` still
/// applies on top of the `--verbose` level.
pub(crate) fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                display_timestamp(),
                record.level(),
                record.args()
            )
        })
        .init();
}
