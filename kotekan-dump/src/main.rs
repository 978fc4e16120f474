//! kotekan-dump -- inspect raw vis dump files.

mod cli;
mod commands;
mod error;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    // Logs go to stderr so stdout stays parseable with --output json
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let writer = OutputWriter::new(cli.output);
    match run(cli.command, &writer) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

fn run(command: Commands, writer: &OutputWriter) -> Result<(), CliError> {
    match command {
        Commands::Summary(args) => commands::summary::execute(args, writer),
        Commands::Show(args) => commands::show::execute(args, writer),
    }
}
