//! Processes that change the number of frames.

use serde_yaml::Mapping;

use kotekan_runner::{DumpVisBuffer, FakeVisBuffer, InputBuffer, KotekanProcessTester, Workdir};
use kotekan_runner_core::FakeVisMode;

use crate::helpers::{global_config, keyed, sim_settings};

#[test]
fn test_e2e_accumulate_groups_per_frequency() {
    let workdir = Workdir::new("test_e2e_accumulate").unwrap();
    let input = FakeVisBuffer::new(10, FakeVisMode::FillIj).freq_ids(vec![1, 2]);
    let output = DumpVisBuffer::new(workdir.path());
    let mut process = Mapping::new();
    process.insert("num_gpu_frames".into(), 4.into());

    KotekanProcessTester::new("visAccumulate", process, &input, &output, &global_config(10))
        .unwrap()
        .with_settings(sim_settings())
        .run()
        .unwrap();

    // 10 samples per frequency -> two full groups each, the rest is dropped
    let frames = output.load().unwrap();
    assert_eq!(frames.len(), 4);
    let keys = keyed(&frames);
    assert_eq!(
        keys,
        vec![(0, 1), (0, 2), (4 * 5 * 390_625, 1), (4 * 5 * 390_625, 2)]
    );
    for frame in &frames {
        // fill_ij is identical in every sample, so the mean is unchanged
        assert_eq!(frame.vis[1].re, 0.0);
        assert_eq!(frame.vis[1].im, 1.0);
    }
}

#[test]
fn test_e2e_merge_interleaves_inputs() {
    let workdir = Workdir::new("test_e2e_merge").unwrap();
    let a = FakeVisBuffer::new(8, FakeVisMode::Default).freq_ids(vec![0]);
    let b = FakeVisBuffer::new(8, FakeVisMode::Default).freq_ids(vec![9]);
    let output = DumpVisBuffer::new(workdir.path());

    KotekanProcessTester::with_buffers(
        "visMerge",
        Mapping::new(),
        vec![&a as &dyn InputBuffer, &b],
        Some(&output),
        &global_config(8),
    )
    .unwrap()
    .with_settings(sim_settings())
    .run()
    .unwrap();

    let frames = output.load().unwrap();
    assert_eq!(frames.len(), 16);
    let keys = keyed(&frames);
    assert_eq!(keys.iter().filter(|(_, f)| *f == 0).count(), 8);
    assert_eq!(keys.iter().filter(|(_, f)| *f == 9).count(), 8);
}
