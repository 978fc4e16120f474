//! `visDebug`: logs every frame and counts frames per `(freq_id, dataset_id)`.
//!
//! With an `out_buf` the frames are passed through unchanged.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{Stage, StageContext};
use crate::buffer::{FrameReceiver, FrameSender};
use crate::error::SimError;

pub struct VisDebug {
    name: String,
    input: FrameReceiver,
    output: Option<FrameSender>,
}

impl VisDebug {
    pub fn from_config(ctx: &mut StageContext<'_>) -> Result<Self, SimError> {
        let output = if ctx.has_local("out_buf") {
            Some(ctx.output("out_buf")?)
        } else {
            None
        };
        Ok(Self {
            name: ctx.unique_name(),
            input: ctx.input("in_buf")?,
            output,
        })
    }
}

impl Stage for VisDebug {
    fn unique_name(&self) -> &str {
        &self.name
    }

    async fn run(mut self) -> Result<(), SimError> {
        let mut counts: BTreeMap<(u32, u32), u64> = BTreeMap::new();

        while let Some(frame) = self.input.recv().await {
            debug!(stage = %self.name, "{}", frame.summary(self.input.buffer()));
            *counts
                .entry((frame.metadata.freq_id, frame.metadata.dataset_id))
                .or_default() += 1;
            if let Some(out) = &self.output {
                out.send(frame).await?;
            }
        }

        for ((freq_id, dataset_id), frames) in &counts {
            info!(stage = %self.name, freq_id, dataset_id, frames, "frame count");
        }
        info!(
            stage = %self.name,
            total = counts.values().sum::<u64>(),
            "input finished"
        );
        Ok(())
    }
}
