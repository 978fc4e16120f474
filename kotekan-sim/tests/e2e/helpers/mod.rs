//! Shared E2E test helpers.

use std::collections::BTreeSet;

use kotekan_runner::{RunnerSettings, init_test_tracing};
use kotekan_runner_core::{GlobalConfig, VisFrame};

/// Harness settings pointing at the freshly built kotekan-sim binary.
pub fn sim_settings() -> RunnerSettings {
    init_test_tracing();
    RunnerSettings::default()
        .with_binary(env!("CARGO_BIN_EXE_kotekan-sim"))
        .with_timeout_secs(60)
}

/// Globals shared by most scenarios: 7 elements, no eigenvectors.
pub fn global_config(total_frames: u64) -> GlobalConfig {
    GlobalConfig::builder()
        .log_level("info")
        .num_elements(7)
        .num_ev(0)
        .total_frames(total_frames)
        .buffer_depth(5)
        .build()
        .expect("valid global config")
}

pub fn assert_binary(frames: &[VisFrame]) {
    let expected: BTreeSet<i64> = [0, 1].into();
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(
            frame.vis_levels().as_ref(),
            Some(&expected),
            "frame {i} is not binary"
        );
    }
}

/// Frames sorted by `(fpga_seq, freq_id)`.
pub fn keyed(frames: &[VisFrame]) -> Vec<(u64, u32)> {
    let mut keys: Vec<(u64, u32)> = frames
        .iter()
        .map(|f| (f.metadata.fpga_seq, f.metadata.freq_id))
        .collect();
    keys.sort_unstable();
    keys
}
