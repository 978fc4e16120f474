//! 에러 타입 — 도메인별 에러 정의

/// kotekan-runner 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 프레임 인코딩/디코딩 에러
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// 외부 프로세스 실행 에러
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 인식되지 않는 키 (선언되지 않은 프로세스 파라미터 포함)
    #[error("unknown config key '{key}'")]
    UnknownKey { key: String },

    /// 키 중복 (인식되는 키와 충돌하거나 두 번 선언됨)
    #[error("duplicate config key '{key}'")]
    DuplicateKey { key: String },

    /// 설정 직렬화 실패
    #[error("failed to render config: {reason}")]
    RenderFailed { reason: String },
}

/// 프레임 인코딩/디코딩 에러
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// 프레임 버퍼가 레이아웃보다 작음
    #[error("vis buffer too small: must be a minimum of {required} bytes (got {actual})")]
    BufferTooSmall { required: usize, actual: usize },

    /// 데이터가 중간에 끊김
    #[error("truncated record at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// 메타데이터 크기가 예상과 다름
    #[error("unexpected metadata size {actual} at offset {offset} (expected {expected})")]
    MetadataSize {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// 프레임 구조가 메타데이터와 불일치
    #[error("frame shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// 외부 프로세스 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// 실행 파일을 찾을 수 없음
    #[error("executable not found: {binary}")]
    NotFound { binary: String },

    /// 프로세스 시작 실패
    #[error("failed to launch {binary}: {reason}")]
    LaunchFailed { binary: String, reason: String },

    /// 0이 아닌 종료 코드
    #[error("process exited with code {code}: {stderr_tail}")]
    NonZeroExit { code: i32, stderr_tail: String },

    /// 시그널로 종료됨
    #[error("process terminated by signal: {stderr_tail}")]
    Signaled { stderr_tail: String },

    /// 제한 시간 초과 (프로세스는 강제 종료됨)
    #[error("process timed out after {secs}s")]
    TimedOut { secs: u64 },
}
