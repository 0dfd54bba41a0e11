//! 작업과 작업 결과.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sync_core::{SyncError, SyncResult};
use tokio_util::sync::CancellationToken;

/// 작업 본문이 반환하는 future.
pub type TaskFuture = BoxFuture<'static, SyncResult<()>>;

/// 작업 본문. 재시도를 위해 여러 번 호출될 수 있습니다.
pub type TaskOperation = Arc<dyn Fn(CancellationToken) -> TaskFuture + Send + Sync>;

/// 이름이 붙은 작업 단위.
///
/// 제출 후에는 변경되지 않습니다. 복제 비용은 `Arc` 복제 수준입니다.
#[derive(Clone)]
pub struct Task {
    id: String,
    description: String,
    operation: TaskOperation,
}

impl Task {
    /// 새 작업을 생성합니다.
    ///
    /// `operation`은 취소 토큰을 받아 future를 돌려주는 클로저입니다.
    pub fn new<F, Fut>(id: impl Into<String>, description: impl Into<String>, operation: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyncResult<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            description: description.into(),
            operation: Arc::new(move |token| Box::pin(operation(token))),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn invoke(&self, token: CancellationToken) -> TaskFuture {
        (self.operation)(token)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// 작업 1회 실행 결과. 생성 후 변경되지 않습니다.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    pub error: Option<SyncError>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
}

impl TaskResult {
    /// 실행을 마친 작업의 결과.
    pub(crate) fn finished(
        task_id: &str,
        start_time: DateTime<Utc>,
        started: Instant,
        outcome: SyncResult<()>,
    ) -> Self {
        let duration = started.elapsed();
        let end_time = Utc::now();
        match outcome {
            Ok(()) => Self {
                task_id: task_id.to_string(),
                success: true,
                error: None,
                start_time,
                end_time,
                duration,
            },
            Err(error) => Self {
                task_id: task_id.to_string(),
                success: false,
                error: Some(error),
                start_time,
                end_time,
                duration,
            },
        }
    }

    /// 실행 슬롯을 얻지 못하고 끝난 작업의 결과 (취소, 종료).
    pub(crate) fn rejected(task_id: &str, error: SyncError) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.to_string(),
            success: false,
            error: Some(error),
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.error, Some(SyncError::Timeout(_)))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(SyncError::Cancelled))
    }
}
