//! # Sync Executor
//!
//! 동시 실행 수를 제한하는 배치 작업 엔진.
//!
//! - [`TaskExecutor`]: 세마포어 기반 동시성 제한, 작업별 타임아웃, 배치/재시도 실행
//! - [`WorkerPool`]: 고정된 워커가 bounded 큐를 소비하는 상주형 실행기
//! - [`ExecutionStats`]: 배치 결과 집계
//!
//! 작업 하나의 실패(에러, 타임아웃, 패닉)는 항상 실패한 [`TaskResult`]로 변환되며
//! 같은 배치의 다른 작업에 영향을 주지 않습니다.

pub mod executor;
pub mod runner;
pub mod stats;
pub mod task;
pub mod worker_pool;

pub use executor::{ExecutorConfig, TaskExecutor};
pub use stats::ExecutionStats;
pub use task::{Task, TaskResult};
pub use tokio_util::sync::CancellationToken;
pub use worker_pool::{PoolConfig, PoolError, WorkerPool};
