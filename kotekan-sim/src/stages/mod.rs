//! Pipeline stages.
//!
//! A [`Stage`] is built from its config block, claims its buffer ends, and
//! then runs to completion as its own task. [`DynStage`] is the
//! dyn-compatible form that lets the pipeline hold heterogeneous stages in a
//! `Vec<Box<dyn DynStage>>`.

mod count_check;
mod fake_vis;
mod process_under_test;
mod raw_file_read;
mod raw_file_write;
mod vis_accumulate;
mod vis_debug;
mod vis_merge;

use std::future::Future;
use std::pin::Pin;

use crate::buffer::{BufferRegistry, FrameReceiver, FrameSender};
use crate::config::{BlockPath, PipelineConfig};
use crate::error::SimError;

pub use count_check::CountCheck;
pub use fake_vis::FakeVis;
pub use process_under_test::ProcessUnderTest;
pub use raw_file_read::RawFileRead;
pub use raw_file_write::RawFileWrite;
pub use vis_accumulate::VisAccumulate;
pub use vis_debug::VisDebug;
pub use vis_merge::VisMerge;

/// Heap-allocated future returned by [`DynStage::run_boxed`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Process types this binary provides.
pub const STAGE_TYPES: &[&str] = &[
    "fakeVis",
    "rawFileRead",
    "rawFileWrite",
    "visDebug",
    "visAccumulate",
    "visMerge",
    "countCheck",
    "processUnderTest",
];

/// A pipeline stage.
///
/// `run` consumes the stage; dropping its senders on return is what tells
/// downstream stages that no more frames are coming.
pub trait Stage: Send {
    /// Unique name (the block path).
    fn unique_name(&self) -> &str;

    fn run(self) -> impl Future<Output = Result<(), SimError>> + Send;
}

/// Dyn-compatible [`Stage`].
pub trait DynStage: Send {
    fn unique_name(&self) -> &str;

    fn run_boxed(self: Box<Self>) -> BoxFuture<'static, Result<(), SimError>>;
}

impl<T: Stage + 'static> DynStage for T {
    fn unique_name(&self) -> &str {
        Stage::unique_name(self)
    }

    fn run_boxed(self: Box<Self>) -> BoxFuture<'static, Result<(), SimError>> {
        Box::pin((*self).run())
    }
}

/// Config access and buffer claiming for a stage under construction.
pub struct StageContext<'a> {
    pub config: &'a PipelineConfig,
    pub path: &'a BlockPath,
    pub buffers: &'a mut BufferRegistry,
}

impl StageContext<'_> {
    pub fn unique_name(&self) -> String {
        self.path.to_string()
    }

    pub fn get_u64(&self, key: &str) -> Result<u64, SimError> {
        self.config.get_u64(self.path, key)
    }

    pub fn get_u64_or(&self, key: &str, default: u64) -> Result<u64, SimError> {
        self.config.get_u64_or(self.path, key, default)
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, SimError> {
        self.config.get_f64(self.path, key)
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> Result<f64, SimError> {
        self.config.get_f64_or(self.path, key, default)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, SimError> {
        self.config.get_bool_or(self.path, key, default)
    }

    pub fn get_string(&self, key: &str) -> Result<String, SimError> {
        self.config.get_string(self.path, key)
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> Result<String, SimError> {
        self.config.get_string_or(self.path, key, default)
    }

    pub fn get_u32_list_or(&self, key: &str, default: Vec<u32>) -> Result<Vec<u32>, SimError> {
        self.config.get_u32_list_or(self.path, key, default)
    }

    /// Whether `key` is set on this block (not inherited from a parent).
    pub fn has_local(&self, key: &str) -> bool {
        self.config.has_local(self.path, key)
    }

    /// Claim the producer end of the buffer named by `key`.
    pub fn output(&mut self, key: &str) -> Result<FrameSender, SimError> {
        let name = self.local_string(key)?;
        let stage = self.unique_name();
        self.buffers.take_producer(&name, &stage)
    }

    /// Claim the consumer end of the buffer named by `key`.
    pub fn input(&mut self, key: &str) -> Result<FrameReceiver, SimError> {
        let name = self.local_string(key)?;
        let stage = self.unique_name();
        self.buffers.take_consumer(&name, &stage)
    }

    /// Claim the consumer ends of every buffer listed under `key`.
    pub fn inputs(&mut self, key: &str) -> Result<Vec<FrameReceiver>, SimError> {
        if !self.has_local(key) {
            return Err(SimError::config(self.unique_name(), key, "required key is missing"));
        }
        let names = self.config.get_string_list(self.path, key)?;
        let stage = self.unique_name();
        names
            .iter()
            .map(|name| self.buffers.take_consumer(name, &stage))
            .collect()
    }

    // Buffer wiring keys are never inherited from parent groups.
    fn local_string(&self, key: &str) -> Result<String, SimError> {
        if !self.has_local(key) {
            return Err(SimError::config(self.unique_name(), key, "required key is missing"));
        }
        self.get_string(key)
    }
}

/// Build the stage for a `kotekan_process` block.
pub fn build_stage(kind: &str, ctx: &mut StageContext<'_>) -> Result<Box<dyn DynStage>, SimError> {
    let stage: Box<dyn DynStage> = match kind {
        "fakeVis" => Box::new(FakeVis::from_config(ctx)?),
        "rawFileRead" => Box::new(RawFileRead::from_config(ctx)?),
        "rawFileWrite" => Box::new(RawFileWrite::from_config(ctx)?),
        "visDebug" => Box::new(VisDebug::from_config(ctx)?),
        "visAccumulate" => Box::new(VisAccumulate::from_config(ctx)?),
        "visMerge" => Box::new(VisMerge::from_config(ctx)?),
        "countCheck" => Box::new(CountCheck::from_config(ctx)?),
        "processUnderTest" => Box::new(ProcessUnderTest::from_config(ctx)?),
        other => {
            return Err(SimError::UnknownProcess {
                block: ctx.unique_name(),
                kind: other.to_owned(),
            });
        }
    };
    Ok(stage)
}
