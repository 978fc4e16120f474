//! `fakeVis`: synthetic frame source.

use std::time::Duration;

use tracing::{debug, info};

use kotekan_runner_core::generator::{FakeVisGenerator, FakeVisMode, FakeVisParams};

use super::{Stage, StageContext};
use crate::buffer::FrameSender;
use crate::error::SimError;

pub struct FakeVis {
    name: String,
    out: FrameSender,
    params: FakeVisParams,
    wait: bool,
}

impl FakeVis {
    pub fn from_config(ctx: &mut StageContext<'_>) -> Result<Self, SimError> {
        let name = ctx.unique_name();
        let defaults = FakeVisParams::default();

        let mode: FakeVisMode = ctx
            .get_string_or("mode", defaults.mode.as_str())?
            .parse()
            .map_err(|e: kotekan_runner_core::ConfigError| {
                SimError::config(name.clone(), "mode", e.to_string())
            })?;
        let num_frames = match ctx.get_u64_or("num_frames", 0)? {
            0 => ctx.get_u64("total_frames")?,
            n => n,
        };
        let cadence_secs = ctx.get_f64_or("cadence", defaults.cadence_secs)?;
        if cadence_secs.is_nan() || cadence_secs <= 0.0 {
            return Err(SimError::config(name, "cadence", "must be positive"));
        }
        let freq_ids = ctx.get_u32_list_or("freq_ids", defaults.freq_ids.clone())?;
        if freq_ids.is_empty() {
            return Err(SimError::config(name, "freq_ids", "must not be empty"));
        }

        let out = ctx.output("out_buf")?;
        let shape = out.shape();
        let params = FakeVisParams {
            num_elements: shape.num_elements,
            num_ev: shape.num_ev,
            num_frames,
            mode,
            freq_ids,
            cadence_secs,
            seed: ctx.get_u64_or("seed", defaults.seed)?,
            start_time: ctx.get_f64_or("start_time", defaults.start_time)?,
        };

        Ok(Self {
            name,
            out,
            params,
            wait: ctx.get_bool_or("wait", false)?,
        })
    }
}

impl Stage for FakeVis {
    fn unique_name(&self) -> &str {
        &self.name
    }

    async fn run(self) -> Result<(), SimError> {
        let cadence = Duration::from_secs_f64(self.params.cadence_secs);
        let per_sample = self.params.freq_ids.len();
        let total = self.params.total_output_frames();
        info!(
            stage = %self.name,
            buffer = self.out.buffer(),
            mode = %self.params.mode,
            frames = total,
            "generating frames"
        );

        for (index, frame) in FakeVisGenerator::new(self.params.clone()).enumerate() {
            if self.wait && index > 0 && index % per_sample == 0 {
                tokio::time::sleep(cadence).await;
            }
            self.out.send(frame).await?;
        }

        debug!(stage = %self.name, frames = total, "generator finished");
        Ok(())
    }
}
