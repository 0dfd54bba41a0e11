//! 거래일 캘린더.
//!
//! 주말과 휴장 구간을 제외한 평일을 거래일로 봅니다.
//!
//! 휴장 구간은 두 종류입니다:
//! - **매년 반복** (`MM-DD..MM-DD`): 기본값으로 신정(01-01)과 국경절(10-01..10-07)
//! - **특정 연도** (`YYYY-MM-DD..YYYY-MM-DD`): 춘절 등 해마다 날짜가 바뀌는 휴장일은
//!   설정(`CALENDAR_HOLIDAYS`)으로 주입
//!
//! 외부 API 없이 동작하는 순수 함수만 제공합니다.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use std::str::FromStr;

/// 최근 거래일 탐색 시 거슬러 올라가는 최대 일수 (연휴 대비).
pub const MAX_LOOKBACK_DAYS: i64 = 30;

/// 휴장 구간 (양 끝 포함).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolidayRange {
    /// 매년 반복되는 월/일 구간. `start > end`이면 연말연시를 넘는 구간입니다.
    Recurring { start: (u32, u32), end: (u32, u32) },
    /// 특정 날짜 구간
    Dated { start: NaiveDate, end: NaiveDate },
}

impl HolidayRange {
    /// 날짜가 구간에 포함되는지 확인합니다.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            HolidayRange::Recurring { start, end } => {
                let md = (date.month(), date.day());
                if start <= end {
                    start <= md && md <= end
                } else {
                    md >= start || md <= end
                }
            }
            HolidayRange::Dated { start, end } => start <= date && date <= end,
        }
    }
}

impl FromStr for HolidayRange {
    type Err = String;

    /// `YYYY-MM-DD`, `YYYY-MM-DD..YYYY-MM-DD`, `MM-DD..MM-DD` 형식을 파싱합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (left, right) = match s.trim().split_once("..") {
            Some((l, r)) => (l.trim(), r.trim()),
            None => (s.trim(), s.trim()),
        };

        if let (Ok(start), Ok(end)) = (
            NaiveDate::parse_from_str(left, "%Y-%m-%d"),
            NaiveDate::parse_from_str(right, "%Y-%m-%d"),
        ) {
            if start > end {
                return Err(format!("Invalid holiday range (start > end): {}", s));
            }
            return Ok(HolidayRange::Dated { start, end });
        }

        match (parse_month_day(left), parse_month_day(right)) {
            (Some(start), Some(end)) => Ok(HolidayRange::Recurring { start, end }),
            _ => Err(format!("Invalid holiday range: {}", s)),
        }
    }
}

fn parse_month_day(s: &str) -> Option<(u32, u32)> {
    let (m, d) = s.split_once('-')?;
    let month: u32 = m.parse().ok()?;
    let day: u32 = d.parse().ok()?;
    // 윤년 기준으로 유효한 월/일인지 확인
    NaiveDate::from_ymd_opt(2000, month, day)?;
    Some((month, day))
}

/// 한 번의 작업 실행 동안 고정되는 거래일 판정 결과.
///
/// 작업 단계 사이에 공유 플래그 대신 값으로 전달됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingDayCheck {
    /// 거래소 현지 날짜
    pub date: NaiveDate,
    /// 거래일 여부
    pub is_trading_day: bool,
    /// 당일 거래 세션 종료 여부 (비거래일이면 true)
    pub session_closed: bool,
}

/// 거래일 캘린더.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    holidays: Vec<HolidayRange>,
    timezone: Tz,
    close_time: NaiveTime,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self {
            holidays: Self::default_holidays(),
            timezone: chrono_tz::Asia::Shanghai,
            close_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl TradingCalendar {
    /// 기본 휴장 구간(신정, 국경절)과 상하이 시간 15:00 마감으로 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 반복 휴장 구간.
    pub fn default_holidays() -> Vec<HolidayRange> {
        vec![
            HolidayRange::Recurring {
                start: (1, 1),
                end: (1, 1),
            },
            HolidayRange::Recurring {
                start: (10, 1),
                end: (10, 7),
            },
        ]
    }

    /// 휴장 구간을 추가합니다.
    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = HolidayRange>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    /// 거래소 시간대를 설정합니다.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// 장 마감 시각(현지)을 설정합니다.
    pub fn with_close_time(mut self, close_time: NaiveTime) -> Self {
        self.close_time = close_time;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// 주어진 날짜가 거래일인지 확인합니다.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self.holidays.iter().any(|h| h.contains(date))
    }

    /// `date` 이하의 가장 최근 거래일을 반환합니다.
    ///
    /// 최대 [`MAX_LOOKBACK_DAYS`]일까지만 거슬러 올라가며, 찾지 못하면 `None`입니다.
    pub fn most_recent_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        (0..=MAX_LOOKBACK_DAYS)
            .map(|offset| date - Duration::days(offset))
            .find(|d| self.is_trading_day(*d))
    }

    /// UTC 시각을 거래소 현지 날짜로 변환합니다.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// 현재 시각 기준 당일 세션이 종료되었는지 확인합니다.
    ///
    /// 비거래일은 항상 종료된 것으로 봅니다.
    pub fn is_session_closed(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        if !self.is_trading_day(local.date_naive()) {
            return true;
        }
        local.time() >= self.close_time
    }

    /// `date` 장 마감 시각(UTC).
    ///
    /// 현지 시각이 존재하지 않는 경우(DST 전환)만 `None`입니다.
    pub fn session_close_at(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&date.and_time(self.close_time))
            .earliest()
            .map(|close| close.with_timezone(&Utc))
    }

    /// 작업 실행 시점의 거래일 판정 값을 만듭니다.
    pub fn check(&self, now: DateTime<Utc>) -> TradingDayCheck {
        let date = self.local_date(now);
        TradingDayCheck {
            date,
            is_trading_day: self.is_trading_day(date),
            session_closed: self.is_session_closed(now),
        }
    }
}
