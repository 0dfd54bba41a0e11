//! 증분 동기화 정책.
//!
//! (종목, 단위)마다 다음에 수집해야 할 윈도우를 계산합니다.
//!
//! # 판정 흐름
//!
//! ```text
//! 최신 레코드 조회
//!         │
//!     ┌───┴────┐
//!     │ 없음?  │── YES ──> RangeFetch (1990-01-01 ~ 오늘, 전체 백필)
//!     └───┬────┘
//!         │ NO
//!         ▼
//!   기준일 파싱 ── 실패 ──> Parse 에러 (해당 종목만 실패)
//!         │
//!     ┌───┴───────────────┐
//!     │ 진행 중인 기간?    │── YES ──> RefreshCurrentPeriod (기존 키 삭제 후 재수집)
//!     └───┬───────────────┘
//!         │ NO
//!     ┌───┴───────────────┐
//!     │ 최근 거래일 반영됨? │── YES ──> 장 마감 후 기록? ── YES ──> Skip
//!     └───┬───────────────┘                  │ NO
//!         │                                  └──> RangeFetch (장중 스냅샷 교체)
//!         │ NO
//!         ▼
//!   RangeFetch (마지막 기준일 ~ 오늘)
//! ```
//!
//! 기간 경계 판단은 [`Granularity::same_period`]에만 의존하므로 네 단위 모두
//! 같은 정책을 공유합니다.

use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::calendar::{TradingCalendar, TradingDayCheck};
use crate::domain::{parse_period_date, LatestRecord, Repository, SyncMode, SyncWindow};
use crate::error::SyncResult;
use crate::types::Granularity;

/// 백필 시작일 기본값.
pub const DEFAULT_BACKFILL_START: (i32, u32, u32) = (1990, 1, 1);

/// 비활성 판정 기준 일수 기본값.
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 30;

/// 동기화 정책 설정.
#[derive(Debug, Clone)]
pub struct SyncPolicyConfig {
    /// 레코드가 없을 때 백필을 시작하는 날짜
    pub backfill_start: NaiveDate,
    /// 최신 레코드가 이 일수보다 오래되면 비활성으로 판정 (초과 기준)
    pub stale_after_days: i64,
}

impl Default for SyncPolicyConfig {
    fn default() -> Self {
        let (y, m, d) = DEFAULT_BACKFILL_START;
        Self {
            backfill_start: NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN),
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
        }
    }
}

/// 증분 동기화 정책.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    calendar: TradingCalendar,
    config: SyncPolicyConfig,
}

impl SyncPolicy {
    pub fn new(calendar: TradingCalendar, config: SyncPolicyConfig) -> Self {
        Self { calendar, config }
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    pub fn config(&self) -> &SyncPolicyConfig {
        &self.config
    }

    /// 저장소에서 최신 레코드를 읽어 윈도우를 계산합니다.
    pub async fn compute_window(
        &self,
        repository: &dyn Repository,
        entity_id: &str,
        granularity: Granularity,
        today: &TradingDayCheck,
    ) -> SyncResult<SyncWindow> {
        let latest = repository.get_latest(entity_id, granularity).await?;
        self.plan(entity_id, granularity, latest.as_ref(), today)
    }

    /// 최신 레코드로부터 윈도우를 계산합니다.
    ///
    /// 저장 키 파싱에 실패하면 `SyncError::Parse`를 반환합니다.
    pub fn plan(
        &self,
        entity_id: &str,
        granularity: Granularity,
        latest: Option<&LatestRecord>,
        today: &TradingDayCheck,
    ) -> SyncResult<SyncWindow> {
        let window = |start_date, mode| SyncWindow {
            entity_id: entity_id.to_string(),
            granularity,
            start_date,
            end_date: today.date,
            mode,
        };

        let Some(record) = latest else {
            debug!(entity = entity_id, %granularity, "레코드 없음, 전체 백필");
            return Ok(window(self.config.backfill_start, SyncMode::RangeFetch));
        };

        let last = parse_period_date(&record.last_period_date)?;

        if last > today.date {
            warn!(
                entity = entity_id,
                %granularity,
                last = %last,
                today = %today.date,
                "미래 기준일 레코드, 건너뜀"
            );
            return Ok(window(last, SyncMode::Skip));
        }

        if self.is_open_period(granularity, last, today) {
            return Ok(window(
                granularity.period_start(today.date),
                SyncMode::RefreshCurrentPeriod { stale_key: last },
            ));
        }

        match self.calendar.most_recent_trading_day(today.date) {
            Some(latest_trading)
                if last >= latest_trading && self.captured_after_close(record, latest_trading) =>
            {
                Ok(window(last, SyncMode::Skip))
            }
            _ => Ok(window(last, SyncMode::RangeFetch)),
        }
    }

    /// 레코드가 `trading_day` 장 마감 이후에 기록되었는지 확인합니다.
    ///
    /// 기록 시각을 모르면 장중 값일 수 있으므로 `false`입니다.
    fn captured_after_close(&self, record: &LatestRecord, trading_day: NaiveDate) -> bool {
        match (record.updated_at, self.calendar.session_close_at(trading_day)) {
            (Some(updated_at), Some(close)) => updated_at >= close,
            _ => false,
        }
    }

    /// `last`가 아직 닫히지 않은 현재 기간에 속하는지 확인합니다.
    ///
    /// 일 단위는 당일이 거래일이고 세션이 끝나지 않았을 때만 열린 기간입니다.
    pub fn is_open_period(
        &self,
        granularity: Granularity,
        last: NaiveDate,
        today: &TradingDayCheck,
    ) -> bool {
        match granularity {
            Granularity::Daily => {
                last == today.date && today.is_trading_day && !today.session_closed
            }
            _ => granularity.same_period(last, today.date),
        }
    }

    /// 최신 기준일이 비활성 기준을 넘었는지 확인합니다.
    ///
    /// 정확히 기준 일수와 같으면 비활성이 아닙니다.
    pub fn is_stale(&self, newest: NaiveDate, today: NaiveDate) -> bool {
        today - newest > Duration::days(self.config.stale_after_days)
    }
}
