//! CLI-specific error types and exit code mapping

use kotekan_runner_core::error::{FrameError, RunnerError};

/// CLI-specific error type.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped error from kotekan-runner-core.
    #[error("{0}")]
    Core(#[from] RunnerError),
}

impl From<FrameError> for CliError {
    fn from(e: FrameError) -> Self {
        Self::Core(RunnerError::Frame(e))
    }
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                      |
    /// |------|------------------------------|
    /// | 0    | Success                      |
    /// | 1    | General / command error      |
    /// | 2    | Configuration error          |
    /// | 10   | IO error                     |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) | Self::Core(RunnerError::Io(_)) => 10,
            Self::Core(RunnerError::Config(_)) => 2,
            Self::Command(_) | Self::JsonSerialize(_) | Self::Core(_) => 1,
        }
    }
}
