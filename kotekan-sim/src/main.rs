use std::process::ExitCode;

use clap::Parser;

use kotekan_sim::cli::SimCli;
use kotekan_sim::config::BlockPath;
use kotekan_sim::logging::init_tracing;
use kotekan_sim::{Pipeline, PipelineConfig, SimError};

const DEFAULT_LOG_LEVEL: &str = "info";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = SimCli::parse();

    let config = match PipelineConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| {
            config
                .lookup(&BlockPath::root(), "log_level")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned());

    if let Err(e) = init_tracing(&log_level, &cli.log_format) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    tracing::info!(config = %cli.config.display(), "kotekan-sim starting");

    let result = match Pipeline::build(&config) {
        Ok(pipeline) => pipeline.run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            tracing::info!("kotekan-sim finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, exit_code = e.exit_code(), "kotekan-sim failed");
            fail(&e)
        }
    }
}

fn fail(e: &SimError) -> ExitCode {
    eprintln!("error: {e}");
    ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
}
