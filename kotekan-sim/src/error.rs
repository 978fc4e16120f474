//! Error types and exit code mapping for kotekan-sim.

use kotekan_runner_core::error::{FrameError, RunnerError};

/// Errors raised while building or running a simulated pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Missing or malformed value in the config document.
    #[error("config error in '{block}': {key}: {reason}")]
    Config {
        block: String,
        key: String,
        reason: String,
    },

    /// The config document itself could not be read or parsed.
    #[error("invalid config document: {0}")]
    Document(String),

    /// `kotekan_process` names a stage this binary does not provide.
    #[error("unknown process type '{kind}' in block '{block}'")]
    UnknownProcess { block: String, kind: String },

    /// Buffer declaration or wiring problem.
    #[error("buffer '{buffer}': {reason}")]
    Buffer { buffer: String, reason: String },

    /// A stage failed at run time.
    #[error("stage '{stage}' failed: {reason}")]
    Stage { stage: String, reason: String },

    /// Frame encoding or shape error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// IO error (dump files, config file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                      |
    /// |------|------------------------------|
    /// | 1    | Stage or frame failure       |
    /// | 2    | Configuration error          |
    /// | 10   | IO error                     |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. }
            | Self::Document(_)
            | Self::UnknownProcess { .. }
            | Self::Buffer { .. } => 2,
            Self::Io(_) => 10,
            Self::Stage { .. } | Self::Frame(_) => 1,
        }
    }

    pub(crate) fn config(block: impl Into<String>, key: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            block: block.into(),
            key: key.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn stage(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

impl From<RunnerError> for SimError {
    fn from(e: RunnerError) -> Self {
        match e {
            RunnerError::Io(e) => Self::Io(e),
            RunnerError::Frame(e) => Self::Frame(e),
            RunnerError::Config(e) => Self::Document(e.to_string()),
            RunnerError::Process(e) => Self::stage("process", e.to_string()),
        }
    }
}
