//! CLI argument parsing using clap derive API
//!
//! Purely declarative, no I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use kotekan_runner_core::dump::DEFAULT_EXT;

/// kotekan-dump -- inspect raw vis dump files.
///
/// Use `kotekan-dump <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "kotekan-dump", version, about, long_about = None)]
pub struct Cli {
    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize every dump file in a directory.
    Summary(SummaryArgs),

    /// Print the frames of one dump file.
    Show(ShowArgs),
}

// ---- summary ----

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Directory holding the dump files.
    pub dir: PathBuf,

    /// Only read files whose name starts with this prefix.
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// File extension of dump files.
    #[arg(long, default_value = DEFAULT_EXT)]
    pub ext: String,
}

// ---- show ----

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Dump file to read.
    pub file: PathBuf,

    /// Print at most this many frames.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Include visibility samples.
    #[arg(long)]
    pub vis: bool,
}
