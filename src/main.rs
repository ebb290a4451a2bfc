//! Binary entry point for the Kiln CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use kiln::cli::{BuildCommand, Cli};
use kiln::{Artifact, BuildFailure, BuildOrchestrator, OciConfig, OciDriver, OciDriverError};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("driver error: {0}")]
    Driver(String),
    #[error("build failed: {0}")]
    Build(#[from] BuildFailure<OciDriverError>),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Build(command) => build_command(command).await,
    }
}

async fn build_command(args: BuildCommand) -> Result<i32, CliError> {
    let mut config =
        OciConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    if let Some(name) = args.image_name {
        config.image_name = Some(name);
    }

    let driver = OciDriver::new(config).map_err(|err| CliError::Driver(err.to_string()))?;
    let orchestrator = BuildOrchestrator::new(driver);
    let artifact = orchestrator.execute().await?;

    report_artifact(&artifact);
    Ok(0)
}

fn report_artifact(artifact: &Artifact) {
    writeln!(io::stdout(), "{artifact}").ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
