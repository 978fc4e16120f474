//! `visAccumulate`: averages `num_gpu_frames` consecutive frames per frequency.
//!
//! The output frame keeps the metadata of the first frame in the group, the
//! mean visibilities, and the summed weights. A group still incomplete when
//! the input ends is dropped.

use std::collections::HashMap;

use tracing::{debug, info};

use kotekan_runner_core::frame::{Cf32, VisFrame};

use super::{Stage, StageContext};
use crate::buffer::{FrameReceiver, FrameSender};
use crate::error::SimError;

pub struct VisAccumulate {
    name: String,
    input: FrameReceiver,
    output: FrameSender,
    num_gpu_frames: u64,
}

#[derive(Debug)]
struct Group {
    first: VisFrame,
    vis_sum: Vec<Cf32>,
    count: u64,
}

impl Group {
    fn new(frame: VisFrame) -> Self {
        Self {
            vis_sum: frame.vis.clone(),
            first: frame,
            count: 1,
        }
    }

    fn add(&mut self, frame: &VisFrame) -> Result<(), String> {
        if frame.vis.len() != self.vis_sum.len() {
            return Err(format!(
                "frame with {} products in a group of {}",
                frame.vis.len(),
                self.vis_sum.len()
            ));
        }
        for (acc, v) in self.vis_sum.iter_mut().zip(&frame.vis) {
            acc.re += v.re;
            acc.im += v.im;
        }
        for (acc, w) in self.first.weight.iter_mut().zip(&frame.weight) {
            *acc += *w;
        }
        self.first.evals.clone_from(&frame.evals);
        self.first.evecs.clone_from(&frame.evecs);
        self.first.rms = frame.rms;
        self.count += 1;
        Ok(())
    }

    fn finish(self) -> VisFrame {
        let n = self.count as f32;
        let mut frame = self.first;
        frame.vis = self
            .vis_sum
            .into_iter()
            .map(|v| Cf32::new(v.re / n, v.im / n))
            .collect();
        frame
    }
}

impl VisAccumulate {
    pub fn from_config(ctx: &mut StageContext<'_>) -> Result<Self, SimError> {
        let name = ctx.unique_name();
        let num_gpu_frames = ctx.get_u64("num_gpu_frames")?;
        if num_gpu_frames == 0 {
            return Err(SimError::config(name, "num_gpu_frames", "must be greater than 0"));
        }
        Ok(Self {
            name,
            input: ctx.input("in_buf")?,
            output: ctx.output("out_buf")?,
            num_gpu_frames,
        })
    }
}

impl Stage for VisAccumulate {
    fn unique_name(&self) -> &str {
        &self.name
    }

    async fn run(mut self) -> Result<(), SimError> {
        let mut groups: HashMap<u32, Group> = HashMap::new();
        let mut emitted = 0u64;

        while let Some(frame) = self.input.recv().await {
            let freq_id = frame.metadata.freq_id;
            match groups.get_mut(&freq_id) {
                Some(group) => group
                    .add(&frame)
                    .map_err(|reason| SimError::stage(self.name.clone(), reason))?,
                None => {
                    groups.insert(freq_id, Group::new(frame));
                }
            }

            if groups
                .get(&freq_id)
                .is_some_and(|g| g.count == self.num_gpu_frames)
            {
                if let Some(group) = groups.remove(&freq_id) {
                    self.output.send(group.finish()).await?;
                    emitted += 1;
                }
            }
        }

        let dropped: u64 = groups.values().map(|g| g.count).sum();
        if dropped > 0 {
            debug!(stage = %self.name, dropped, "dropped incomplete groups");
        }
        info!(stage = %self.name, emitted, "accumulation finished");
        Ok(())
    }
}
