//! `countCheck`: fails when the acquisition start time moves.
//!
//! The start time of a frame is `ctime - fpga_seq / 390625`. The first frame
//! fixes the reference; a later frame whose start time differs by more than
//! `start_time_tolerance` seconds means the upstream acquisition restarted.

use tracing::{info, warn};

use kotekan_runner_core::frame::VisFrame;
use kotekan_runner_core::generator::FPGA_COUNTS_PER_SEC;

use super::{Stage, StageContext};
use crate::buffer::FrameReceiver;
use crate::error::SimError;

const DEFAULT_START_TIME_TOLERANCE: f64 = 3.0;

pub struct CountCheck {
    name: String,
    input: FrameReceiver,
    tolerance: f64,
}

fn start_time(frame: &VisFrame) -> f64 {
    frame.metadata.ctime.as_secs_f64() - frame.metadata.fpga_seq as f64 / FPGA_COUNTS_PER_SEC
}

impl CountCheck {
    pub fn from_config(ctx: &mut StageContext<'_>) -> Result<Self, SimError> {
        let name = ctx.unique_name();
        let tolerance = ctx.get_f64_or("start_time_tolerance", DEFAULT_START_TIME_TOLERANCE)?;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(SimError::config(
                name,
                "start_time_tolerance",
                "must not be negative",
            ));
        }
        Ok(Self {
            name,
            input: ctx.input("in_buf")?,
            tolerance,
        })
    }
}

impl Stage for CountCheck {
    fn unique_name(&self) -> &str {
        &self.name
    }

    async fn run(mut self) -> Result<(), SimError> {
        let mut reference: Option<f64> = None;
        let mut frames = 0u64;

        while let Some(frame) = self.input.recv().await {
            let start = start_time(&frame);
            match reference {
                None => reference = Some(start),
                Some(reference) if (start - reference).abs() > self.tolerance => {
                    warn!(
                        stage = %self.name,
                        reference,
                        start,
                        fpga_seq = frame.metadata.fpga_seq,
                        "acquisition start time changed"
                    );
                    return Err(SimError::stage(
                        self.name,
                        format!(
                            "acquisition start time moved by {:.3}s (tolerance {}s)",
                            start - reference,
                            self.tolerance
                        ),
                    ));
                }
                Some(_) => {}
            }
            frames += 1;
        }

        info!(stage = %self.name, frames, "start time stable");
        Ok(())
    }
}
