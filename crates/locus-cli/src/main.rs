mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod simulate;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet)?;

    let envelope = commands::run(&cli).await?;
    output::render(&envelope, cli.pretty)?;

    if envelope.is_exhausted() {
        return Ok(ExitCode::from(3));
    }

    Ok(ExitCode::SUCCESS)
}
