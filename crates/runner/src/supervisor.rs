//! 프로세스 감독: 파이프라인 실행 파일을 띄우고 종료를 기다림
//!
//! 자식 프로세스의 stdout/stderr는 줄 단위로 tracing 이벤트로 전달되고,
//! stderr 마지막 몇 줄은 실패 에러에 첨부됩니다.

use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kotekan_runner_core::error::{ProcessError, RunnerError};

use crate::settings::RunnerSettings;

/// 에러에 첨부하는 stderr 줄 수
pub const STDERR_TAIL_LINES: usize = 20;

/// 자식 종료 후 남은 출력을 기다리는 최대 시간
///
/// 자식이 띄운 백그라운드 프로세스가 파이프를 물고 있으면 EOF가 오지 않습니다.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

type Tail = Arc<Mutex<VecDeque<String>>>;

/// `<binary> --config <config_path>`를 실행하고 종료를 기다립니다.
///
/// 제한 시간을 넘기면 자식 프로세스를 강제 종료하고 `TimedOut`을 반환합니다.
pub async fn run_pipeline(
    settings: &RunnerSettings,
    config_path: &Path,
    run_dir: &Path,
) -> Result<(), RunnerError> {
    let binary = settings.binary.display().to_string();

    let mut child = Command::new(&settings.binary)
        .arg("--config")
        .arg(config_path)
        .current_dir(run_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::NotFound {
                    binary: binary.clone(),
                }
            } else {
                ProcessError::LaunchFailed {
                    binary: binary.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

    info!(binary = %binary, pid = child.id(), "pipeline started");

    let tail: Tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
    let forward = settings.forward_output;
    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_lines(stdout, "stdout", forward, None)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_lines(
            stderr,
            "stderr",
            forward,
            Some(Arc::clone(&tail)),
        )));
    }

    let status = match tokio::time::timeout(settings.timeout(), child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            warn!(
                binary = %binary,
                timeout_secs = settings.timeout_secs,
                "pipeline timed out, killing"
            );
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill timed out pipeline");
            }
            for reader in readers {
                reader.abort();
            }
            return Err(ProcessError::TimedOut {
                secs: settings.timeout_secs,
            }
            .into());
        }
    };

    // 파이프가 닫힐 때까지 남은 출력을 소비
    let aborts: Vec<_> = readers.iter().map(JoinHandle::abort_handle).collect();
    let drain = async {
        for reader in readers {
            if let Err(e) = reader.await {
                debug!(error = %e, "output reader task ended abnormally");
            }
        }
    };
    if tokio::time::timeout(OUTPUT_DRAIN_GRACE, drain).await.is_err() {
        warn!(
            grace_secs = OUTPUT_DRAIN_GRACE.as_secs(),
            "child output still open after exit, abandoning readers"
        );
        for handle in aborts {
            handle.abort();
        }
    }

    check_status(status, &tail)
}

fn check_status(status: ExitStatus, tail: &Tail) -> Result<(), RunnerError> {
    if status.success() {
        info!("pipeline exited successfully");
        return Ok(());
    }

    let stderr_tail = tail
        .lock()
        .map(|lines| lines.iter().cloned().collect::<Vec<_>>().join("\n"))
        .unwrap_or_default();

    match status.code() {
        Some(code) => {
            warn!(code, "pipeline exited with failure");
            Err(ProcessError::NonZeroExit { code, stderr_tail }.into())
        }
        None => {
            warn!("pipeline terminated by signal");
            Err(ProcessError::Signaled { stderr_tail }.into())
        }
    }
}

async fn forward_lines<R>(stream: R, stream_name: &'static str, forward: bool, tail: Option<Tail>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if forward {
                    info!(target: "kotekan", stream = stream_name, "{}", line);
                }
                if let Some(tail) = &tail {
                    if let Ok(mut buf) = tail.lock() {
                        if buf.len() == STDERR_TAIL_LINES {
                            buf.pop_front();
                        }
                        buf.push_back(line);
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(stream = stream_name, error = %e, "failed to read child output");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(binary: &str) -> RunnerSettings {
        RunnerSettings {
            forward_output: false,
            ..RunnerSettings::default()
        }
        .with_binary(binary)
    }

    fn script(dir: &Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-pipeline.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = run_pipeline(
            &settings("/nonexistent/kotekan-binary"),
            &dir.path().join("config.yaml"),
            dir.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Process(ProcessError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn successful_exit_is_ok() {
        let dir = TempDir::new().unwrap();
        let bin = script(dir.path(), "echo \"config=$2\"\nexit 0");
        let s = settings(&bin.display().to_string());
        run_pipeline(&s, &dir.path().join("config.yaml"), dir.path())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr_tail() {
        let dir = TempDir::new().unwrap();
        let bin = script(
            dir.path(),
            "for i in $(seq 1 30); do echo \"line $i\" >&2; done\nexit 3",
        );
        let s = settings(&bin.display().to_string());
        let err = run_pipeline(&s, &dir.path().join("config.yaml"), dir.path())
            .await
            .unwrap_err();
        match err {
            RunnerError::Process(ProcessError::NonZeroExit { code, stderr_tail }) => {
                assert_eq!(code, 3);
                assert!(stderr_tail.ends_with("line 30"));
                assert!(!stderr_tail.contains("line 10\n"));
                assert_eq!(stderr_tail.lines().count(), STDERR_TAIL_LINES);
            }
            other => panic!("expected non-zero exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_pipeline_times_out() {
        let dir = TempDir::new().unwrap();
        let bin = script(dir.path(), "exec sleep 30");
        let s = settings(&bin.display().to_string()).with_timeout_secs(1);
        let err = run_pipeline(&s, &dir.path().join("config.yaml"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Process(ProcessError::TimedOut { secs: 1 })
        ));
    }

    #[tokio::test]
    async fn lingering_grandchild_does_not_block_return() {
        let dir = TempDir::new().unwrap();
        let bin = script(dir.path(), "sleep 5 &\nexit 0");
        let s = settings(&bin.display().to_string()).with_timeout_secs(30);
        let result = tokio::time::timeout(
            OUTPUT_DRAIN_GRACE + Duration::from_secs(2),
            run_pipeline(&s, &dir.path().join("config.yaml"), dir.path()),
        )
        .await
        .expect("run should return once the drain grace expires");
        assert!(result.is_ok());
    }
}
