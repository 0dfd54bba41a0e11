//! 단일 작업 보호 실행.
//!
//! [`TaskExecutor`](crate::TaskExecutor)와 [`WorkerPool`](crate::WorkerPool)이
//! 공유하는 실행 경로입니다. 작업 본문은 별도 tokio 태스크에서 돌기 때문에
//! 패닉이 호출자에게 전파되지 않고, 타임아웃/취소 시에는 태스크를 abort 합니다.

use chrono::Utc;
use std::any::Any;
use std::time::{Duration, Instant};
use sync_core::SyncError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::task::{Task, TaskResult};

/// 작업을 타임아웃과 취소 토큰 아래에서 한 번 실행합니다.
///
/// 반환값은 항상 [`TaskResult`]이며 패닉은 `SyncError::Panicked`로 변환됩니다.
pub async fn run_guarded(task: &Task, timeout: Duration, token: &CancellationToken) -> TaskResult {
    let start_time = Utc::now();
    let started = Instant::now();

    let handle = tokio::spawn(task.invoke(token.clone()));
    let abort = handle.abort_handle();

    let outcome = tokio::select! {
        joined = tokio::time::timeout(timeout, handle) => match joined {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_panic() => {
                let message = panic_message(join_err.into_panic());
                warn!(task_id = task.id(), panic = %message, "작업 패닉");
                Err(SyncError::Panicked(message))
            }
            Ok(Err(_)) => Err(SyncError::Cancelled),
            Err(_) => {
                abort.abort();
                warn!(task_id = task.id(), timeout_secs = timeout.as_secs_f64(), "작업 타임아웃");
                Err(SyncError::Timeout(timeout))
            }
        },
        _ = token.cancelled() => {
            abort.abort();
            debug!(task_id = task.id(), "작업 취소됨");
            Err(SyncError::Cancelled)
        }
    };

    TaskResult::finished(task.id(), start_time, started, outcome)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "알 수 없는 패닉".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_and_error_are_passed_through() {
        let token = CancellationToken::new();
        let ok = Task::new("ok", "", |_| async { Ok(()) });
        let bad = Task::new("bad", "", |_| async { Err(SyncError::Fetch("502".into())) });

        let ok_result = run_guarded(&ok, Duration::from_secs(1), &token).await;
        let bad_result = run_guarded(&bad, Duration::from_secs(1), &token).await;

        assert!(ok_result.success);
        assert!(!bad_result.success);
        assert_eq!(bad_result.error, Some(SyncError::Fetch("502".into())));
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_result() {
        let token = CancellationToken::new();
        fn explode() -> sync_core::SyncResult<()> {
            panic!("explode")
        }
        let task = Task::new("panic", "", |_| async { explode() });

        let result = run_guarded(&task, Duration::from_secs(1), &token).await;
        assert!(!result.success);
        assert_eq!(result.error, Some(SyncError::Panicked("explode".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct_kind() {
        let token = CancellationToken::new();
        let task = Task::new("slow", "", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });

        let result = run_guarded(&task, Duration::from_millis(100), &token).await;
        assert!(result.is_timeout());
        assert_eq!(
            result.error.map(|e| e.kind()),
            Some(sync_core::ErrorKind::Timeout)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_running_task() {
        let token = CancellationToken::new();
        let task = Task::new("long", "", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result = run_guarded(&task, Duration::from_secs(120), &token).await;
        assert!(result.is_cancelled());
    }
}
