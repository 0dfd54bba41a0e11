//! 에러 타입 정의.

use thiserror::Error;

use crate::jobs::JobKind;

/// Collector 에러 타입.
///
/// 작업(job) 전체를 중단시키는 에러만 표현합니다. 종목 단위 실패는
/// `sync_core::SyncError`로 `TaskResult`에 담깁니다.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 작업 준비 실패 (종목 목록 로드 등)
    #[error("작업 준비 실패: {0}")]
    Setup(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(#[from] sqlx::Error),

    /// 스케줄러 에러
    #[error("스케줄러 에러: {0}")]
    Scheduler(String),

    /// 같은 작업이 이미 실행 중
    #[error("작업이 이미 실행 중입니다: {0}")]
    AlreadyRunning(JobKind),
}

impl From<tokio_cron_scheduler::JobSchedulerError> for CollectorError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        Self::Scheduler(err.to_string())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
