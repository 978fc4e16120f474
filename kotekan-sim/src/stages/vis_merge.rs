//! `visMerge`: forwards frames from every buffer in `in_bufs` into `out_buf`.
//!
//! Frames from one input keep their order; inputs are interleaved in
//! arrival order.

use tokio::task::JoinSet;
use tracing::{debug, info};

use super::{Stage, StageContext};
use crate::buffer::{FrameReceiver, FrameSender};
use crate::error::SimError;

pub struct VisMerge {
    name: String,
    inputs: Vec<FrameReceiver>,
    output: FrameSender,
}

impl VisMerge {
    pub fn from_config(ctx: &mut StageContext<'_>) -> Result<Self, SimError> {
        let name = ctx.unique_name();
        let inputs = ctx.inputs("in_bufs")?;
        if inputs.is_empty() {
            return Err(SimError::config(name, "in_bufs", "must list at least one buffer"));
        }
        Ok(Self {
            name,
            inputs,
            output: ctx.output("out_buf")?,
        })
    }
}

async fn forward(mut input: FrameReceiver, output: FrameSender) -> Result<u64, SimError> {
    let mut count = 0;
    while let Some(frame) = input.recv().await {
        output.send(frame).await?;
        count += 1;
    }
    debug!(buffer = input.buffer(), frames = count, "merge input drained");
    Ok(count)
}

impl Stage for VisMerge {
    fn unique_name(&self) -> &str {
        &self.name
    }

    async fn run(self) -> Result<(), SimError> {
        let mut tasks = JoinSet::new();
        for input in self.inputs {
            tasks.spawn(forward(input, self.output.clone()));
        }
        // the forwarders hold the only remaining senders
        drop(self.output);

        let mut total = 0u64;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(count)) => total += count,
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(SimError::stage(self.name, e.to_string())),
            }
        }
        info!(stage = %self.name, frames = total, "merge finished");
        Ok(())
    }
}
