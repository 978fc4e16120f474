//! Failure reporting: launch errors, config errors, and timeouts.

use serde_yaml::Mapping;

use kotekan_runner::{DumpVisBuffer, FakeVisBuffer, KotekanProcessTester, Workdir};
use kotekan_runner_core::FakeVisMode;
use kotekan_runner_core::error::{ProcessError, RunnerError};

use crate::helpers::{global_config, sim_settings};

#[test]
fn test_e2e_unknown_process_exits_with_config_code() {
    let workdir = Workdir::new("test_e2e_unknown_process").unwrap();
    let input = FakeVisBuffer::new(4, FakeVisMode::Default);
    let output = DumpVisBuffer::new(workdir.path());

    let err = KotekanProcessTester::new(
        "notAProcess",
        Mapping::new(),
        &input,
        &output,
        &global_config(4),
    )
    .unwrap()
    .with_settings(sim_settings())
    .run()
    .unwrap_err();

    match err {
        RunnerError::Process(ProcessError::NonZeroExit { code, stderr_tail }) => {
            assert_eq!(code, 2);
            assert!(stderr_tail.contains("notAProcess"));
        }
        other => panic!("expected non-zero exit, got {other:?}"),
    }
}

#[test]
fn test_e2e_missing_binary_is_reported() {
    let workdir = Workdir::new("test_e2e_missing_binary").unwrap();
    let input = FakeVisBuffer::new(4, FakeVisMode::Default);
    let output = DumpVisBuffer::new(workdir.path());

    let err = KotekanProcessTester::new(
        "visDebug",
        Mapping::new(),
        &input,
        &output,
        &global_config(4),
    )
    .unwrap()
    .with_settings(sim_settings().with_binary(workdir.path().join("no-such-kotekan")))
    .run()
    .unwrap_err();

    assert!(matches!(
        err,
        RunnerError::Process(ProcessError::NotFound { .. })
    ));
}

#[test]
fn test_e2e_slow_pipeline_is_killed() {
    let workdir = Workdir::new("test_e2e_slow_pipeline").unwrap();
    // real-time generation: 10 samples 5 s apart
    let input = FakeVisBuffer::new(10, FakeVisMode::Default).wait(true);
    let output = DumpVisBuffer::new(workdir.path());

    let err = KotekanProcessTester::new(
        "visDebug",
        Mapping::new(),
        &input,
        &output,
        &global_config(10),
    )
    .unwrap()
    .with_settings(sim_settings().with_timeout_secs(1))
    .run()
    .unwrap_err();

    assert!(matches!(
        err,
        RunnerError::Process(ProcessError::TimedOut { secs: 1 })
    ));
}
