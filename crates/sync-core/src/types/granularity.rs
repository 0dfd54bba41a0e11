//! 시계열 동기화 단위 정의.
//!
//! 일/주/월/연 단위별 기간 경계 판단이 동기화 정책에서 유일하게 달라지는 부분이므로
//! 모든 기간 계산은 이 모듈에 모여 있습니다.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 시계열 기간 단위.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// 일봉
    Daily,
    /// 주봉 (ISO 주 기준)
    Weekly,
    /// 월봉
    Monthly,
    /// 연봉
    Yearly,
}

impl Granularity {
    /// 모든 단위를 짧은 것부터 반환합니다.
    pub fn all() -> [Granularity; 4] {
        [
            Granularity::Daily,
            Granularity::Weekly,
            Granularity::Monthly,
            Granularity::Yearly,
        ]
    }

    /// 소문자 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
            Granularity::Yearly => "yearly",
        }
    }

    /// `date`가 속한 기간의 첫 날을 반환합니다.
    ///
    /// 주 단위는 ISO 주의 월요일입니다.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Weekly => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Monthly => date.with_day(1).unwrap_or(date),
            Granularity::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    /// 두 날짜가 같은 기간에 속하는지 확인합니다.
    pub fn same_period(&self, a: NaiveDate, b: NaiveDate) -> bool {
        match self {
            Granularity::Daily => a == b,
            Granularity::Weekly => a.iso_week() == b.iso_week(),
            Granularity::Monthly => a.year() == b.year() && a.month() == b.month(),
            Granularity::Yearly => a.year() == b.year(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "d" | "1d" => Ok(Granularity::Daily),
            "weekly" | "w" | "1w" => Ok(Granularity::Weekly),
            "monthly" | "m" | "1m" => Ok(Granularity::Monthly),
            "yearly" | "y" | "1y" => Ok(Granularity::Yearly),
            _ => Err(format!("Invalid granularity: {}", s)),
        }
    }
}
