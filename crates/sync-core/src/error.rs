//! 동기화 작업의 에러 타입.
//!
//! 작업(Task) 단위 에러는 모두 [`SyncError`]로 표현되며, 배치 전체를 중단시키지 않습니다.
//! 통계와 알림에서 느린 공급자와 실제 실패를 구분할 수 있도록 타임아웃과 취소는
//! 별도 variant로 둡니다.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 작업 단위 동기화 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// 외부 공급자 조회 실패 (네트워크, 공급자 오류). 재시도 가능.
    #[error("수집 에러: {0}")]
    Fetch(String),

    /// 날짜/페이로드 형식 오류. 재시도하지 않음.
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 저장소 호출 실패. 재시도 가능.
    #[error("저장소 에러: {0}")]
    Repository(String),

    /// 작업이 허용 시간을 초과함
    #[error("작업 타임아웃: {0:?} 초과")]
    Timeout(Duration),

    /// 배치 마감 또는 종료 진행 중
    #[error("작업 취소됨")]
    Cancelled,

    /// 작업 실행 중 패닉 발생
    #[error("작업 패닉: {0}")]
    Panicked(String),

    /// 종료된 executor에 제출됨
    #[error("executor가 이미 종료되었습니다")]
    ExecutorClosed,
}

/// 에러 분류 (통계/로그용).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Fetch,
    Parse,
    Repository,
    Timeout,
    Cancelled,
    Panicked,
    Closed,
}

impl SyncError {
    /// 에러 분류를 반환합니다.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Fetch(_) => ErrorKind::Fetch,
            SyncError::Parse(_) => ErrorKind::Parse,
            SyncError::Repository(_) => ErrorKind::Repository,
            SyncError::Timeout(_) => ErrorKind::Timeout,
            SyncError::Cancelled => ErrorKind::Cancelled,
            SyncError::Panicked(_) => ErrorKind::Panicked,
            SyncError::ExecutorClosed => ErrorKind::Closed,
        }
    }

    /// 재시도로 복구될 수 있는 일시적 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Fetch(_) | SyncError::Repository(_) | SyncError::Timeout(_)
        )
    }

    /// 취소 에러인지 확인합니다.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Fetch => write!(f, "fetch"),
            ErrorKind::Parse => write!(f, "parse"),
            ErrorKind::Repository => write!(f, "repository"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::Panicked => write!(f, "panicked"),
            ErrorKind::Closed => write!(f, "closed"),
        }
    }
}

/// 동기화 작업을 위한 Result 타입.
pub type SyncResult<T> = Result<T, SyncError>;
