//! # Sync Notification
//!
//! 동기화 작업 결과 알림.
//!
//! 지원 채널:
//! - Webhook (기업 메신저 봇 형식의 JSON POST)
//! - 로그 (tracing)
//!
//! 알림 실패는 호출자가 로그로 남기며 작업 결과에는 영향을 주지 않습니다.

pub mod manager;
pub mod types;
pub mod webhook;

pub use manager::*;
pub use types::*;
pub use webhook::*;
