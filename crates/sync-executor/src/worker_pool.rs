//! 고정 워커 풀.
//!
//! N개의 워커가 용량 M의 bounded 큐를 소비합니다. 제출은 블로킹하지 않으며
//! 큐가 가득 차면 즉시 [`PoolError::QueueFull`]을 반환합니다.
//! 결과는 완료 순서대로 용량 `M + N`의 결과 채널에 쌓입니다. 결과 채널이 차면
//! 워커가 수거를 기다리며 멈추므로, 호출자는 [`WorkerPool::next_result`]로
//! 결과를 소비하거나 [`WorkerPool::close`]로 회수해야 합니다. 소비하지 않으면
//! 큐가 차고 제출이 `QueueFull`로 거부됩니다.

use futures::future::join_all;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use sync_core::SyncError;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::runner::run_guarded;
use crate::task::{Task, TaskResult};

/// 워커 풀 제출 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("작업 큐가 가득 찼습니다 (용량 {0})")]
    QueueFull(usize),

    #[error("워커 풀이 이미 종료되었습니다")]
    Closed,
}

/// 워커 풀 설정.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub task_timeout: Duration,
}

impl PoolConfig {
    /// 결과 채널 용량. 큐와 실행 중인 작업을 모두 담을 수 있는 크기입니다.
    pub fn result_buffer(&self) -> usize {
        self.queue_capacity + self.workers
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 100,
            task_timeout: Duration::from_secs(300),
        }
    }
}

type SharedQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>;

/// 상주형 워커 풀.
pub struct WorkerPool {
    config: PoolConfig,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    results: tokio::sync::Mutex<mpsc::Receiver<TaskResult>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// 워커를 띄웁니다. tokio 런타임 안에서 호출해야 합니다.
    pub fn new(mut config: PoolConfig) -> Self {
        config.workers = config.workers.max(1);
        config.queue_capacity = config.queue_capacity.max(1);

        let (task_tx, task_rx) = mpsc::channel::<Task>(config.queue_capacity);
        let (result_tx, result_rx) = mpsc::channel(config.result_buffer());
        let queue: SharedQueue = Arc::new(tokio::sync::Mutex::new(task_rx));
        let shutdown = CancellationToken::new();

        let workers = (0..config.workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    queue.clone(),
                    result_tx.clone(),
                    config.task_timeout,
                    shutdown.clone(),
                ))
            })
            .collect();

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "워커 풀 시작"
        );

        Self {
            config,
            sender: Mutex::new(Some(task_tx)),
            results: tokio::sync::Mutex::new(result_rx),
            workers: tokio::sync::Mutex::new(workers),
            shutdown,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 작업을 큐에 넣습니다. 블로킹하지 않습니다.
    pub fn submit(&self, task: Task) -> Result<(), PoolError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(PoolError::Closed);
        };

        sender.try_send(task).map_err(|e| match e {
            TrySendError::Full(task) => {
                debug!(task_id = task.id(), "큐 포화, 제출 거부");
                PoolError::QueueFull(self.config.queue_capacity)
            }
            TrySendError::Closed(_) => PoolError::Closed,
        })
    }

    /// 다음 완료 결과를 기다립니다. 모든 워커가 끝나고 결과가 비면 `None`.
    pub async fn next_result(&self) -> Option<TaskResult> {
        self.results.lock().await.recv().await
    }

    /// 큐에 남은 작업과 실행 중인 작업을 취소 결과로 마무리하게 합니다.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// 제출을 막고, 큐에 들어온 작업이 모두 끝날 때까지 기다린 뒤
    /// 아직 수거되지 않은 결과를 반환합니다.
    pub async fn close(&self) -> Vec<TaskResult> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().await);
        let mut results = self.results.lock().await;
        let mut remaining = Vec::new();

        // 결과 채널이 차서 멈춘 워커가 끝날 수 있도록 기다리는 동안 수거
        let joined = join_all(workers);
        tokio::pin!(joined);
        let outcomes = loop {
            tokio::select! {
                outcomes = &mut joined => break outcomes,
                Some(result) = results.recv() => remaining.push(result),
            }
        };
        for outcome in outcomes {
            if let Err(e) = outcome {
                warn!(error = %e, "워커 종료 실패");
            }
        }

        while let Ok(result) = results.try_recv() {
            remaining.push(result);
        }
        info!(drained = remaining.len(), "워커 풀 종료 완료");
        remaining
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: SharedQueue,
    results: mpsc::Sender<TaskResult>,
    timeout: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        let result = if shutdown.is_cancelled() {
            TaskResult::rejected(task.id(), SyncError::Cancelled)
        } else {
            run_guarded(&task, timeout, &shutdown).await
        };

        if results.send(result).await.is_err() {
            break;
        }
    }
    debug!(worker_id, "워커 종료");
}
