//! processUnderTest between a fakeVis input and a dump capture.

use serde_yaml::Mapping;

use kotekan_runner::{DumpVisBuffer, FakeVisBuffer, KotekanProcessTester, Workdir};
use kotekan_runner_core::error::{ProcessError, RunnerError};
use kotekan_runner_core::{FakeVisMode, GlobalConfig, VisFrame};

use crate::helpers::{assert_binary, sim_settings};

const NUM_FRAMES: u64 = 128;

fn test_config() -> GlobalConfig {
    GlobalConfig::builder()
        .log_level("info")
        .num_elements(7)
        .num_ev(0)
        .total_frames(NUM_FRAMES)
        .param("variable_my_process_needs", -1_i64)
        .build()
        .expect("valid global config")
}

#[test]
fn test_e2e_output_is_binary() {
    let workdir = Workdir::new("test_e2e_output_is_binary").unwrap();
    let input = FakeVisBuffer::new(NUM_FRAMES, FakeVisMode::Gaussian);
    let output = DumpVisBuffer::new(workdir.path());

    KotekanProcessTester::new(
        "processUnderTest",
        Mapping::new(),
        &input,
        &output,
        &test_config(),
    )
    .unwrap()
    .with_settings(sim_settings())
    .run()
    .unwrap();

    let frames = output.load().unwrap();
    assert_eq!(frames.len() as u64, NUM_FRAMES);
    assert_binary(&frames);
}

fn run_gaussian(label: &str) -> Vec<VisFrame> {
    let workdir = Workdir::new(label).unwrap();
    let input = FakeVisBuffer::new(NUM_FRAMES, FakeVisMode::Gaussian);
    let output = DumpVisBuffer::new(workdir.path());

    KotekanProcessTester::new(
        "processUnderTest",
        Mapping::new(),
        &input,
        &output,
        &test_config(),
    )
    .unwrap()
    .with_settings(sim_settings())
    .run()
    .unwrap();

    output.load().unwrap()
}

#[test]
fn test_e2e_rerun_gives_identical_frames() {
    let first = run_gaussian("test_e2e_rerun_first");
    let second = run_gaussian("test_e2e_rerun_second");

    assert_eq!(first.len() as u64, NUM_FRAMES);
    assert_eq!(first.len(), second.len());
    for (i, (a, b)) in first.iter().zip(&second).enumerate() {
        assert_eq!(a.metadata, b.metadata, "frame {i} metadata differs");
        assert_eq!(a.vis, b.vis, "frame {i} vis differs");
    }
}

#[test]
fn test_e2e_positive_threshold_is_applied() {
    let workdir = Workdir::new("test_e2e_positive_threshold").unwrap();
    // fill_ij puts (i, j) in each product: only (0, 0) is below the threshold
    let input = FakeVisBuffer::new(4, FakeVisMode::FillIj);
    let output = DumpVisBuffer::new(workdir.path());
    let config = GlobalConfig::builder()
        .num_elements(4)
        .num_ev(0)
        .total_frames(4)
        .param("variable_my_process_needs", 0.5)
        .build()
        .unwrap();

    KotekanProcessTester::new("processUnderTest", Mapping::new(), &input, &output, &config)
        .unwrap()
        .with_settings(sim_settings())
        .run()
        .unwrap();

    let frames = output.load().unwrap();
    assert_eq!(frames.len(), 4);
    assert_binary(&frames);
    for frame in &frames {
        assert_eq!(frame.vis[0].re, 0.0);
        assert!(frame.vis[1..].iter().all(|v| v.re == 1.0 && v.im == 0.0));
    }
}

#[test]
fn test_e2e_missing_threshold_fails_as_config_error() {
    let workdir = Workdir::new("test_e2e_missing_threshold").unwrap();
    let input = FakeVisBuffer::new(2, FakeVisMode::Default);
    let output = DumpVisBuffer::new(workdir.path());
    let config = GlobalConfig::builder().total_frames(2).build().unwrap();

    let err = KotekanProcessTester::new(
        "processUnderTest",
        Mapping::new(),
        &input,
        &output,
        &config,
    )
    .unwrap()
    .with_settings(sim_settings())
    .run()
    .unwrap_err();

    match err {
        RunnerError::Process(ProcessError::NonZeroExit { code, stderr_tail }) => {
            assert_eq!(code, 2);
            assert!(stderr_tail.contains("variable_my_process_needs"));
        }
        other => panic!("expected non-zero exit, got {other:?}"),
    }
    assert!(output.load().unwrap().is_empty());
}
