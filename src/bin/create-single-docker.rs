use std::process::ExitCode;

use clap::Parser;
use ovxr_docker::{RunLog, RunRequest, ToolConfig, Workflow};

mod workflows;

use workflows::{init_logging, resolve_archives, Cli, InputMode};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let log = RunLog::console().verbose(cli.verbose);

    let config = match ToolConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log.error(format!("Failed to load configuration: {e:#}"));
            return ExitCode::FAILURE;
        }
    };
    log.debug(format!("Configuration: {config:?}"));

    let Some((mode, archives)) = resolve_archives(&cli, &log) else {
        return ExitCode::FAILURE;
    };
    if mode == InputMode::Easy {
        log.debug(format!(
            "Auto-discovered ISO tar: {}",
            archives.iso_tar.display()
        ));
    }

    let request = RunRequest {
        archives,
        platform: cli.platform,
        docker_name: cli.docker_name,
        target: cli.target,
        cleanup: !cli.no_cleanup,
        temp_dir: cli.temp_dir,
        verbose: cli.verbose,
    };

    let outcome = Workflow::new(config).run(request);
    if outcome.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
