//! 하네스 설정 — 실행 바이너리, 제한 시간, 작업 디렉토리 보존 여부
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`KOTEKAN_BIN`, `KOTEKAN_RUNNER_TIMEOUT_SECS` 등)
//! 2. 설정 파일 (`KOTEKAN_RUNNER_CONFIG` 또는 현재 디렉토리의 `kotekan-runner.toml`)
//! 3. 기본값 (`Default` 구현)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use kotekan_runner_core::error::{ConfigError, RunnerError};

/// 기본 설정 파일 이름
pub const DEFAULT_SETTINGS_FILE: &str = "kotekan-runner.toml";

const MAX_TIMEOUT_SECS: u64 = 3600;
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// 하네스 실행 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerSettings {
    /// 파이프라인 실행 파일 (PATH에서 검색 가능)
    pub binary: PathBuf,
    /// 실행 제한 시간 (초)
    pub timeout_secs: u64,
    /// 실행 후 작업 디렉토리를 남길지 여부
    pub keep_workdir: bool,
    /// 설정 문서의 `log_level`을 강제로 덮어씀
    pub log_level: Option<String>,
    /// 자식 프로세스 출력을 tracing으로 전달할지 여부
    pub forward_output: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("kotekan"),
            timeout_secs: 120,
            keep_workdir: false,
            log_level: None,
            forward_output: true,
        }
    }
}

impl RunnerSettings {
    /// 설정 파일(있으면)과 환경변수로부터 설정을 로드합니다.
    pub fn load() -> Result<Self, RunnerError> {
        let mut settings = match std::env::var("KOTEKAN_RUNNER_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) if Path::new(DEFAULT_SETTINGS_FILE).is_file() => {
                Self::from_file(DEFAULT_SETTINGS_FILE)?
            }
            Err(_) => Self::default(),
        };
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RunnerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RunnerError::Io(e)
            }
        })?;
        let settings = Self::parse(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, RunnerError> {
        toml::from_str(toml_str).map_err(|e| {
            RunnerError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("KOTEKAN_BIN") {
            self.binary = PathBuf::from(val);
        }
        override_u64(&mut self.timeout_secs, "KOTEKAN_RUNNER_TIMEOUT_SECS");
        override_bool(&mut self.keep_workdir, "KOTEKAN_RUNNER_KEEP_TMP");
        if let Ok(val) = std::env::var("KOTEKAN_RUNNER_LOG_LEVEL") {
            self.log_level = Some(val);
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.binary.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "binary".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_TIMEOUT_SECS}"),
            }
            .into());
        }

        if let Some(level) = &self.log_level {
            if !VALID_LOG_LEVELS.contains(&level.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "log_level".to_owned(),
                    reason: format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
                }
                .into());
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 실행 바이너리를 지정한 설정을 반환합니다.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// 제한 시간을 지정한 설정을 반환합니다.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// 환경변수가 참 값(`1`, `true`, `yes`)인지 확인합니다.
pub(crate) fn env_flag(env_key: &str) -> bool {
    std::env::var(env_key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => *target = true,
            "0" | "false" | "no" => *target = false,
            _ => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
