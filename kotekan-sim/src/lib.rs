//! kotekan-sim library.
//!
//! Exposes the pipeline pieces for integration testing. The `kotekan-sim`
//! binary (main.rs) is what the test harness launches.

pub mod buffer;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod stages;

pub use config::PipelineConfig;
pub use error::SimError;
pub use pipeline::Pipeline;
