//! 동기화 작업(job) 정의.
//!
//! 각 작업은 하나의 데이터셋을 담당하며, 종목마다 하나의 Task를 만듭니다.
//!
//! | 작업                  | 데이터셋           | 기본 동시성 |
//! |-----------------------|--------------------|-------------|
//! | `daily_price`         | 일봉               | 8           |
//! | `weekly_price`        | 주봉               | 8           |
//! | `monthly_price`       | 월봉               | 8           |
//! | `yearly_price`        | 연봉               | 4           |
//! | `holder_count`        | 주주 수            | 2           |
//! | `performance_report`  | 실적 속보          | 2           |

pub mod price_sync;
pub mod schedule;
pub mod snapshot;

pub use price_sync::{price_sync_task, PriceSyncContext};
pub use schedule::{ScheduleEntry, ScheduleTable};
pub use snapshot::{holder_count_task, performance_report_task, SnapshotContext};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use sync_core::Granularity;

/// 작업 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    DailyPrice,
    WeeklyPrice,
    MonthlyPrice,
    YearlyPrice,
    HolderCount,
    PerformanceReport,
}

impl JobKind {
    /// 실행 순서대로 모든 작업.
    pub fn all() -> [JobKind; 6] {
        [
            JobKind::DailyPrice,
            JobKind::WeeklyPrice,
            JobKind::MonthlyPrice,
            JobKind::YearlyPrice,
            JobKind::HolderCount,
            JobKind::PerformanceReport,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::DailyPrice => "daily_price",
            JobKind::WeeklyPrice => "weekly_price",
            JobKind::MonthlyPrice => "monthly_price",
            JobKind::YearlyPrice => "yearly_price",
            JobKind::HolderCount => "holder_count",
            JobKind::PerformanceReport => "performance_report",
        }
    }

    /// 가격 작업이면 해당 단위.
    pub fn granularity(&self) -> Option<Granularity> {
        match self {
            JobKind::DailyPrice => Some(Granularity::Daily),
            JobKind::WeeklyPrice => Some(Granularity::Weekly),
            JobKind::MonthlyPrice => Some(Granularity::Monthly),
            JobKind::YearlyPrice => Some(Granularity::Yearly),
            JobKind::HolderCount | JobKind::PerformanceReport => None,
        }
    }

    /// 시계열 작업은 비활성 종목을 건너뜁니다.
    pub fn is_time_series(&self) -> bool {
        self.granularity().is_some()
    }

    /// 거래일에만 실행하는 작업인지.
    pub fn trading_days_only(&self) -> bool {
        self.is_time_series()
    }

    pub fn default_concurrency(&self) -> usize {
        match self {
            JobKind::DailyPrice | JobKind::WeeklyPrice | JobKind::MonthlyPrice => 8,
            JobKind::YearlyPrice => 4,
            JobKind::HolderCount | JobKind::PerformanceReport => 2,
        }
    }

    /// 기본 cron 식 (초 분 시 일 월 요일, UTC).
    ///
    /// 상하이 장 마감(07:00 UTC) 이후에 가격 작업이 차례로 돕니다.
    pub fn default_schedule(&self) -> &'static str {
        match self {
            JobKind::DailyPrice => "0 30 8 * * Mon-Fri",
            JobKind::WeeklyPrice => "0 45 8 * * Mon-Fri",
            JobKind::MonthlyPrice => "0 0 9 * * Mon-Fri",
            JobKind::YearlyPrice => "0 15 9 * * Mon-Fri",
            JobKind::HolderCount => "0 0 2 * * Sat",
            JobKind::PerformanceReport => "0 0 3 * * Sat",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            JobKind::DailyPrice => "일봉 동기화",
            JobKind::WeeklyPrice => "주봉 동기화",
            JobKind::MonthlyPrice => "월봉 동기화",
            JobKind::YearlyPrice => "연봉 동기화",
            JobKind::HolderCount => "주주 수 동기화",
            JobKind::PerformanceReport => "실적 속보 동기화",
        }
    }

    /// 환경 변수 접두어 (예: `JOB_DAILY_PRICE_`).
    pub fn env_prefix(&self) -> String {
        format!("JOB_{}_", self.as_str().to_uppercase())
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        JobKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("Unknown job: {}", s))
    }
}
