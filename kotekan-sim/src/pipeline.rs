//! Pipeline assembly and execution.
//!
//! Buffers are created first, then every `kotekan_process` block is turned
//! into a stage that claims its buffer ends. Once every buffer has exactly
//! one producer and one consumer, all stages are spawned as tokio tasks.
//!
//! The run succeeds when every stage has returned `Ok`. The first failure
//! aborts the remaining stages.

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::buffer::BufferRegistry;
use crate::config::{BlockKind, PipelineConfig};
use crate::error::SimError;
use crate::stages::{DynStage, StageContext, build_stage};

pub struct Pipeline {
    stages: Vec<Box<dyn DynStage>>,
}

impl Pipeline {
    pub fn build(config: &PipelineConfig) -> Result<Self, SimError> {
        let mut buffers = BufferRegistry::from_config(config)?;
        let mut stages = Vec::new();

        for block in config.blocks()? {
            let BlockKind::Process(kind) = &block.kind else {
                continue;
            };
            let mut ctx = StageContext {
                config,
                path: &block.path,
                buffers: &mut buffers,
            };
            let stage = build_stage(kind, &mut ctx)?;
            debug!(stage = stage.unique_name(), kind = %kind, "built stage");
            stages.push(stage);
        }

        buffers.check_wiring()?;
        if stages.is_empty() {
            return Err(SimError::Document("no processes declared".to_owned()));
        }
        info!(stages = stages.len(), buffers = buffers.len(), "pipeline assembled");
        Ok(Self { stages })
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.unique_name()).collect()
    }

    /// Run every stage to completion.
    pub async fn run(self) -> Result<(), SimError> {
        let mut tasks = JoinSet::new();
        for stage in self.stages {
            let name = stage.unique_name().to_owned();
            let fut = stage.run_boxed();
            tasks.spawn(async move { (name, fut.await) });
        }

        while let Some(joined) = tasks.join_next().await {
            let (name, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tasks.abort_all();
                    return Err(SimError::stage("pipeline", format!("stage task failed: {e}")));
                }
            };
            match result {
                Ok(()) => debug!(stage = %name, "stage finished"),
                Err(e) => {
                    error!(stage = %name, error = %e, "stage failed, stopping pipeline");
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        info!("all stages finished");
        Ok(())
    }
}
