//! Frames flowing unchanged through pass-through processes.

use serde_yaml::Mapping;

use kotekan_runner::{
    DumpVisBuffer, FakeVisBuffer, KotekanProcessTester, ReadVisBuffer, Workdir,
};
use kotekan_runner_core::{Cf32, FakeVisMode, Timespec, VisFrame};

use crate::helpers::{global_config, keyed, sim_settings};

fn handmade_frames(count: u64) -> Vec<VisFrame> {
    (0..count)
        .map(|t| {
            let mut frame = VisFrame::new(7, 0);
            frame.metadata.fpga_seq = t * 800;
            frame.metadata.ctime = Timespec::from_secs_f64(1.5e9 + t as f64);
            frame.metadata.freq_id = 3;
            for (k, v) in frame.vis.iter_mut().enumerate() {
                *v = Cf32::new(k as f32, t as f32);
            }
            frame.weight.fill(1.0);
            frame
        })
        .collect()
}

#[test]
fn test_e2e_frame_count_matches_total_frames() {
    let workdir = Workdir::new("test_e2e_frame_count").unwrap();
    let input = FakeVisBuffer::new(16, FakeVisMode::Default).freq_ids(vec![0, 5]);
    let output = DumpVisBuffer::new(workdir.path());

    KotekanProcessTester::new("visDebug", Mapping::new(), &input, &output, &global_config(16))
        .unwrap()
        .with_settings(sim_settings())
        .run()
        .unwrap();

    let frames = output.load().unwrap();
    assert_eq!(frames.len(), 32);
    let keys = keyed(&frames);
    assert_eq!(keys.iter().filter(|(_, f)| *f == 5).count(), 16);
    // one sample every 5 s at 390625 counts per second
    assert_eq!(keys[2].0, 5 * 390_625);
}

#[test]
fn test_e2e_read_buffer_round_trips_frames() {
    let workdir = Workdir::new("test_e2e_read_buffer").unwrap();
    let frames = handmade_frames(6);
    let input = ReadVisBuffer::new(frames.clone());
    let output = DumpVisBuffer::new(workdir.path());

    KotekanProcessTester::new("visDebug", Mapping::new(), &input, &output, &global_config(6))
        .unwrap()
        .with_settings(sim_settings())
        .run()
        .unwrap();

    assert_eq!(output.load().unwrap(), frames);
}

#[test]
fn test_e2e_count_check_accepts_steady_stream() {
    let input = FakeVisBuffer::new(12, FakeVisMode::PhaseIj);

    KotekanProcessTester::with_buffers(
        "countCheck",
        Mapping::new(),
        vec![&input],
        None,
        &global_config(12),
    )
    .unwrap()
    .with_settings(sim_settings())
    .run()
    .unwrap();
}
