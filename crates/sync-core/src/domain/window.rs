//! 동기화 윈도우.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Granularity;

/// 윈도우 처리 방식.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncMode {
    /// `start_date..=end_date` 범위 수집
    RangeFetch,
    /// 진행 중인 기간을 다시 수집.
    ///
    /// `stale_key`의 기존 레코드를 먼저 삭제한 뒤 기간 누계 스냅샷 하나를 저장합니다.
    RefreshCurrentPeriod { stale_key: NaiveDate },
    /// 이미 최신 상태
    Skip,
}

/// (종목, 단위)별로 매 실행마다 새로 계산되는 수집 윈도우.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub entity_id: String,
    pub granularity: Granularity,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub mode: SyncMode,
}

impl SyncWindow {
    pub fn is_skip(&self) -> bool {
        matches!(self.mode, SyncMode::Skip)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::RangeFetch => write!(f, "range_fetch"),
            SyncMode::RefreshCurrentPeriod { .. } => write!(f, "refresh_current_period"),
            SyncMode::Skip => write!(f, "skip"),
        }
    }
}
