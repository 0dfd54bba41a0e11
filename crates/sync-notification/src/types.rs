//! 알림 타입 및 trait 정의.

use async_trait::async_trait;

/// 알림 작업용 Result 타입.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// 알림 에러.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("알림 전송 실패: {0}")]
    SendFailed(String),

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),

    /// HTTP 200 이지만 본문의 errcode가 0이 아님
    #[error("수신 측 거부 (errcode {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("요청 한도 초과: {0}초 후 재시도")]
    RateLimited(u64),

    #[error("네트워크 에러: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// 작업 요약 알림 전송기.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 요약 문자열을 전송합니다.
    async fn notify(&self, summary: &str) -> NotificationResult<()>;

    /// 전송기가 활성화되어 있는지 확인합니다.
    fn is_enabled(&self) -> bool {
        true
    }

    /// 전송기 이름을 반환합니다.
    fn name(&self) -> &str;
}
