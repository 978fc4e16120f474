//! CLI argument definitions for kotekan-sim.

use std::path::PathBuf;

use clap::Parser;

/// Stand-in kotekan pipeline.
///
/// Reads a kotekan-style YAML config, wires the declared buffers and
/// processes together, and runs them until every source is exhausted.
#[derive(Parser, Debug)]
#[command(name = "kotekan-sim")]
#[command(version, about, long_about = None)]
pub struct SimCli {
    /// Path to the pipeline config document.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the `log_level` key of the config document.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, pretty).
    #[arg(long, default_value = "json")]
    pub log_format: String,
}
