//! 동시성 제한 작업 실행기.
//!
//! # 구조
//!
//! ```text
//! execute_batch(tasks)
//!     │
//!     ├─ child token ← shutdown token        (배치 마감 시 cancel)
//!     │
//!     ├─ join_all ─┬─ acquire permit ─> run_guarded ─> TaskResult[0]
//!     │            ├─ acquire permit ─> run_guarded ─> TaskResult[1]
//!     │            └─ ...                              (입력 순서 유지)
//!     │
//!     └─ ExecutionStats::from_results
//! ```
//!
//! 세마포어 permit은 RAII로 반환되므로 성공, 실패, 타임아웃, 패닉 어느 경로에서도
//! 슬롯이 새지 않습니다. 취소된 작업은 permit을 얻기 전에 빠져나가며 슬롯을 쓰지 않습니다.

use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sync_core::SyncError;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::runner::run_guarded;
use crate::stats::ExecutionStats;
use crate::task::{Task, TaskResult};

/// 실행기 설정.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// 최대 동시 실행 수 (1 미만은 1로 보정)
    pub max_concurrency: usize,
    /// 작업당 최대 실행 시간
    pub task_timeout: Duration,
    /// 배치 전체 마감 시간. 초과하면 남은 작업을 취소합니다.
    pub batch_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            task_timeout: Duration::from_secs(300),
            batch_timeout: None,
        }
    }
}

impl ExecutorConfig {
    pub fn new(max_concurrency: usize, task_timeout: Duration) -> Self {
        Self {
            max_concurrency,
            task_timeout,
            batch_timeout: None,
        }
    }

    pub fn with_batch_timeout(mut self, limit: Duration) -> Self {
        self.batch_timeout = Some(limit);
        self
    }
}

/// 동시성 제한 작업 실행기.
pub struct TaskExecutor {
    config: ExecutorConfig,
    slots: Arc<Semaphore>,
    shutdown: CancellationToken,
    closing: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// 진행 중 작업 수를 세는 가드. drop 시 감소하고 마지막이면 대기자를 깨웁니다.
struct InFlight<'a> {
    count: &'a AtomicUsize,
    idle: &'a Notify,
}

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize, idle: &'a Notify) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self { count, idle }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl TaskExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_shutdown(config, CancellationToken::new())
    }

    /// 외부 종료 토큰에 연결된 실행기를 생성합니다.
    pub fn with_shutdown(mut config: ExecutorConfig, shutdown: CancellationToken) -> Self {
        config.max_concurrency = config.max_concurrency.max(1);
        Self {
            slots: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
            shutdown,
            closing: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// 실행기 전체 취소 토큰. cancel 하면 대기/실행 중인 모든 작업이 취소됩니다.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 현재 사용 가능한 실행 슬롯 수.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// 작업 하나를 실행합니다.
    ///
    /// 슬롯이 빌 때까지 대기하며 결과는 항상 반환됩니다.
    pub async fn execute(&self, task: &Task) -> TaskResult {
        self.execute_with_token(task, &self.shutdown).await
    }

    async fn execute_with_token(&self, task: &Task, token: &CancellationToken) -> TaskResult {
        let _guard = InFlight::enter(&self.in_flight, &self.idle);

        if self.is_closed() {
            return TaskResult::rejected(task.id(), SyncError::ExecutorClosed);
        }

        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(task_id = task.id(), "슬롯 대기 중 취소됨");
                return TaskResult::rejected(task.id(), SyncError::Cancelled);
            }
            permit = self.slots.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return TaskResult::rejected(task.id(), SyncError::ExecutorClosed),
            },
        };

        let result = run_guarded(task, self.config.task_timeout, token).await;
        drop(permit);

        match &result.error {
            None => debug!(
                task_id = task.id(),
                elapsed_ms = result.duration.as_millis() as u64,
                "작업 완료"
            ),
            Some(e) => warn!(task_id = task.id(), error = %e, "작업 실패"),
        }
        result
    }

    /// 작업 목록을 동시성 제한 아래에서 모두 실행합니다.
    ///
    /// 결과는 입력과 같은 순서로 반환됩니다. 배치 마감 시간이 설정되어 있으면
    /// 마감 시점에 남은 작업(대기 및 실행 중)을 모두 취소 결과로 마무리합니다.
    pub async fn execute_batch(&self, tasks: Vec<Task>) -> (Vec<TaskResult>, ExecutionStats) {
        let start_time = Utc::now();
        if tasks.is_empty() {
            return (Vec::new(), ExecutionStats::empty(start_time));
        }

        let batch_token = self.shutdown.child_token();
        info!(
            tasks = tasks.len(),
            concurrency = self.config.max_concurrency,
            "배치 실행 시작"
        );

        let all = join_all(
            tasks
                .iter()
                .map(|task| self.execute_with_token(task, &batch_token)),
        );
        tokio::pin!(all);

        let results = match self.config.batch_timeout {
            Some(limit) => tokio::select! {
                results = &mut all => results,
                _ = tokio::time::sleep(limit) => {
                    warn!(limit_secs = limit.as_secs(), "배치 마감 시간 초과, 남은 작업 취소");
                    batch_token.cancel();
                    all.await
                }
            },
            None => all.await,
        };

        let stats = ExecutionStats::from_results(&results, start_time, Utc::now());
        (results, stats)
    }

    /// 실패 시 지정 횟수만큼 재시도합니다.
    ///
    /// 최초 실행 포함 최대 `max_retries + 1`회 실행되며, 취소나 재시도 불가 에러
    /// (파싱, 패닉, 종료)에서는 즉시 마지막 결과를 반환합니다.
    pub async fn execute_with_retry(
        &self,
        task: &Task,
        max_retries: u32,
        delay: Duration,
    ) -> TaskResult {
        let mut attempt = 0u32;
        loop {
            let result = self.execute(task).await;
            let retryable = result
                .error
                .as_ref()
                .map(SyncError::is_retryable)
                .unwrap_or(false);

            if result.success || !retryable || attempt >= max_retries {
                return result;
            }

            attempt += 1;
            warn!(
                task_id = task.id(),
                attempt,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                "작업 재시도"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => return result,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// 새 작업을 거부하고 진행 중인 작업이 모두 결과를 낼 때까지 기다립니다.
    ///
    /// 반환 후에는 슬롯 풀이 닫혀 이후 `execute`는 `ExecutorClosed` 결과를 돌려줍니다.
    pub async fn close(&self) {
        self.closing.store(true, Ordering::Release);
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::Acquire) == 0 {
                break;
            }
            notified.await;
        }
        self.slots.close();
        info!("executor 종료 완료");
    }
}
