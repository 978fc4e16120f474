#![doc = include_str!("../README.md")]

pub mod config;
pub mod dump;
pub mod error;
pub mod frame;
pub mod generator;
pub mod layout;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, FrameError, ProcessError, RunnerError};

// 설정
pub use config::{GlobalConfig, GlobalConfigBuilder, ParamValue};

// 프레임
pub use frame::{Cf32, MAX_NUM_ELEMENTS, Timespec, VisFrame, VisMetadata};

// 덤프 코덱
pub use dump::{DumpWriter, load_files, read_dump_file};

// 생성기
pub use generator::{FakeVisGenerator, FakeVisMode, FakeVisParams};

// 레이아웃
pub use layout::VisLayout;
