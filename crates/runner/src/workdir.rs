//! 작업 디렉토리 — 테스트 한 건이 쓰는 임시 디렉토리
//!
//! [`Workdir`]가 drop되면 성공, 에러, 패닉 중 어떤 경로로 빠져나가도
//! 디렉토리가 삭제됩니다. [`Workdir::keep`]을 호출했거나
//! `KOTEKAN_RUNNER_KEEP_TMP`가 설정된 경우에만 남깁니다.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use kotekan_runner_core::error::RunnerError;

use crate::settings::env_flag;

/// 작업 디렉토리 보존 환경변수
pub const KEEP_ENV: &str = "KOTEKAN_RUNNER_KEEP_TMP";

const MAX_PREFIX_LEN: usize = 64;

/// 스코프 기반 임시 작업 디렉토리
#[derive(Debug)]
pub struct Workdir {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl Workdir {
    /// 테스트 이름을 접두사로 하는 고유 디렉토리를 생성합니다.
    pub fn new(test_name: &str) -> Result<Self, RunnerError> {
        let prefix = format!("{}_", sanitize(test_name));
        let dir = tempfile::Builder::new().prefix(&prefix).tempdir()?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "created work directory");
        Ok(Self {
            dir: Some(dir),
            path,
            keep: env_flag(KEEP_ENV),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// drop 시 디렉토리를 삭제하지 않도록 표시합니다.
    pub fn keep(&mut self) {
        self.keep = true;
    }

    pub fn is_kept(&self) -> bool {
        self.keep
    }
}

impl Drop for Workdir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.keep {
            let path = dir.keep();
            info!(path = %path.display(), "keeping work directory");
        }
        // 그 외에는 TempDir drop이 디렉토리를 지움
    }
}

/// 파일 이름에 쓸 수 없는 문자를 `_`로 바꿉니다.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_PREFIX_LEN)
        .collect();
    if cleaned.is_empty() {
        "kotekan".to_owned()
    } else {
        cleaned
    }
}
