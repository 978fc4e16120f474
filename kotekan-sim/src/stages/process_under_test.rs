//! `processUnderTest`: binarizes visibilities.
//!
//! Each product maps to `1` when its magnitude is above
//! `variable_my_process_needs` and to `0` otherwise. A negative threshold
//! selects the per-frame median instead: products are ranked by magnitude
//! (ties broken by product index) and the upper half maps to `1`, so any
//! frame with two or more products contains both levels.

use tracing::{debug, info};

use kotekan_runner_core::frame::{Cf32, VisFrame};

use super::{Stage, StageContext};
use crate::buffer::{FrameReceiver, FrameSender};
use crate::error::SimError;

pub const THRESHOLD_KEY: &str = "variable_my_process_needs";

pub struct ProcessUnderTest {
    name: String,
    input: FrameReceiver,
    output: FrameSender,
    threshold: f64,
}

const ZERO: Cf32 = Cf32::new(0.0, 0.0);
const ONE: Cf32 = Cf32::new(1.0, 0.0);

/// Binarize `vis` in place.
pub fn binarize(vis: &mut [Cf32], threshold: f64) {
    if threshold >= 0.0 {
        for v in vis.iter_mut() {
            *v = if f64::from(v.norm()) > threshold { ONE } else { ZERO };
        }
        return;
    }

    let mut order: Vec<(usize, f32)> = vis.iter().map(|v| v.norm()).enumerate().collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    let lower = vis.len() - vis.len() / 2;
    for (rank, (index, _)) in order.into_iter().enumerate() {
        vis[index] = if rank >= lower { ONE } else { ZERO };
    }
}

impl ProcessUnderTest {
    pub fn from_config(ctx: &mut StageContext<'_>) -> Result<Self, SimError> {
        let name = ctx.unique_name();
        let threshold = ctx.get_f64(THRESHOLD_KEY)?;
        if threshold.is_nan() {
            return Err(SimError::config(name, THRESHOLD_KEY, "must be a number"));
        }
        Ok(Self {
            name,
            input: ctx.input("in_buf")?,
            output: ctx.output("out_buf")?,
            threshold,
        })
    }

    fn process(&self, mut frame: VisFrame) -> VisFrame {
        binarize(&mut frame.vis, self.threshold);
        frame
    }
}

impl Stage for ProcessUnderTest {
    fn unique_name(&self) -> &str {
        &self.name
    }

    async fn run(mut self) -> Result<(), SimError> {
        info!(stage = %self.name, threshold = self.threshold, "binarizing visibilities");
        let mut frames = 0u64;
        while let Some(frame) = self.input.recv().await {
            let frame = self.process(frame);
            debug!(stage = %self.name, "{}", frame.summary(self.output.buffer()));
            self.output.send(frame).await?;
            frames += 1;
        }
        info!(stage = %self.name, frames, "input finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use std::collections::BTreeSet;

    fn values(vis: &[Cf32]) -> Vec<f32> {
        vis.iter().map(|v| v.re).collect()
    }

    #[test]
    fn fixed_threshold() {
        let mut vis = vec![Cf32::new(0.1, 0.0), Cf32::new(3.0, 4.0), Cf32::new(0.0, 2.0)];
        binarize(&mut vis, 2.0);
        assert_eq!(values(&vis), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn median_split_yields_both_levels() {
        let mut vis = vec![Cf32::new(5.0, 0.0); 28];
        binarize(&mut vis, -1.0);
        let ones = vis.iter().filter(|v| **v == ONE).count();
        assert_eq!(ones, 14);
        assert!(vis.iter().all(|v| *v == ONE || *v == ZERO));
    }

    #[test]
    fn median_split_on_odd_length() {
        let mut vis = vec![Cf32::new(3.0, 0.0), Cf32::new(1.0, 0.0), Cf32::new(2.0, 0.0)];
        binarize(&mut vis, -1.0);
        assert_eq!(values(&vis), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn single_product_median_is_zero() {
        let mut vis = vec![Cf32::new(3.0, 0.0)];
        binarize(&mut vis, -1.0);
        assert_eq!(values(&vis), vec![0.0]);
    }

    #[test]
    fn threshold_comes_from_root() {
        let yaml = doc(
            "num_elements: 7\nnum_ev: 0\nvariable_my_process_needs: -1",
            "  kotekan_process: processUnderTest\n  in_buf: in0\n  out_buf: out0\n",
        );
        assert!(build(&yaml).is_ok());
    }

    #[test]
    fn missing_threshold_is_config_error() {
        let yaml = doc(
            "num_elements: 7\nnum_ev: 0",
            "  kotekan_process: processUnderTest\n  in_buf: in0\n  out_buf: out0\n",
        );
        let err = build(&yaml).err().unwrap();
        assert!(err.to_string().contains(THRESHOLD_KEY));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn frames_become_binary() {
        let yaml = doc(
            "num_elements: 7\nnum_ev: 0\nvariable_my_process_needs: -1",
            "  kotekan_process: processUnderTest\n  in_buf: in0\n  out_buf: out0\n",
        );
        let (stage, mut buffers, _) = build(&yaml).unwrap();
        let tx = buffers.take_producer("in0", "test").unwrap();
        let rx = buffers.take_consumer("out0", "test").unwrap();
        let collector = tokio::spawn(collect(rx));
        let handle = tokio::spawn(stage.run_boxed());

        let mut frame = VisFrame::new(7, 0);
        for (i, v) in frame.vis.iter_mut().enumerate() {
            *v = Cf32::new(i as f32 * 0.3, -0.7);
        }
        tx.send(frame).await.unwrap();
        drop(tx);
        handle.await.unwrap().unwrap();

        let out = collector.await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].vis_levels(), Some(BTreeSet::from([0, 1])));
    }
}
