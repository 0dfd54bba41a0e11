//! 종목, 최신 레코드, 스냅샷 데이터셋.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::types::Granularity;

/// 추적 대상 종목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// 종목 코드 (예: "000001.SZ")
    pub id: String,
    /// 종목명
    pub name: String,
    /// 활성 여부 (상장폐지/거래정지 추정 시 false)
    pub active: bool,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: true,
        }
    }
}

/// 저장소에서 읽은 (종목, 단위)별 최신 레코드.
///
/// `last_period_date`는 저장된 키 그대로이며 정책에서 파싱합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestRecord {
    pub entity_id: String,
    pub granularity: Granularity,
    /// 저장 키 형식 (`YYYYMMDD` 또는 `YYYY-MM-DD`)
    pub last_period_date: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 저장 키 날짜를 파싱합니다.
///
/// `YYYYMMDD`와 `YYYY-MM-DD` 두 형식을 허용합니다.
pub fn parse_period_date(raw: &str) -> Result<NaiveDate, SyncError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|e| SyncError::Parse(format!("잘못된 기간 키 '{}': {}", raw, e)))
}

/// 날짜를 저장 키 형식(`YYYYMMDD`)으로 변환합니다.
pub fn format_period_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// 분기별 주주 수 (소유 구조 데이터셋).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderCount {
    pub entity_id: String,
    /// 기준일
    pub end_date: NaiveDate,
    /// 주주 수
    pub holder_num: i64,
}

/// 실적 속보 (성과 보고서 데이터셋).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub entity_id: String,
    /// 보고 기간 종료일
    pub end_date: NaiveDate,
    /// 공시일
    pub ann_date: Option<NaiveDate>,
    pub revenue: Option<Decimal>,
    pub net_profit: Option<Decimal>,
    pub eps: Option<Decimal>,
    pub roe: Option<Decimal>,
}
