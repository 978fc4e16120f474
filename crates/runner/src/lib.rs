#![doc = include_str!("../README.md")]

pub mod buffers;
pub mod logging;
pub mod settings;
pub mod supervisor;
pub mod tester;
pub mod workdir;

pub use buffers::{Buffer, DumpVisBuffer, FakeVisBuffer, InputBuffer, OutputBuffer, ReadVisBuffer};
pub use logging::init_test_tracing;
pub use settings::RunnerSettings;
pub use tester::{KotekanProcessTester, KotekanRunner};
pub use workdir::Workdir;
