//! 테스트용 로깅 초기화

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 테스트 출력 캡처와 함께 tracing subscriber를 설치합니다.
///
/// 여러 번 호출해도 한 번만 설치됩니다. `RUST_LOG`가 없으면 `info` 레벨을 씁니다.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        // 다른 subscriber가 이미 설치되어 있으면 그대로 둠
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
