//! 기간별 가격 바와 집계.
//!
//! 공급자가 연봉이나 진행 중인 기간의 스냅샷을 직접 제공하지 않을 때
//! 더 작은 단위의 바를 모아 하나의 바로 만듭니다.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Granularity;

/// 한 기간의 가격 바.
///
/// 저장소의 upsert 키는 (`entity_id`, `period_date`)입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBar {
    /// 종목 코드 (예: "000001.SZ")
    pub entity_id: String,
    /// 기간 단위
    pub granularity: Granularity,
    /// 기간 기준일 (기간 내 마지막 거래일)
    pub period_date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// 직전 기간 종가
    pub pre_close: Decimal,
    /// 거래량
    pub volume: Decimal,
    /// 거래대금
    pub amount: Decimal,
}

/// 같은 기간에 속한 바들을 하나의 바로 집계합니다.
///
/// 시가/직전종가는 첫 바, 종가와 기준일은 마지막 바에서 가져오고
/// 고가/저가는 최대/최소, 거래량/거래대금은 합계입니다.
/// 입력 순서와 무관하게 날짜순으로 정렬한 뒤 집계하며, 빈 입력이면 `None`입니다.
pub fn aggregate_bars(bars: &[PriceBar], granularity: Granularity) -> Option<PriceBar> {
    let mut sorted: Vec<&PriceBar> = bars.iter().collect();
    sorted.sort_by_key(|b| b.period_date);

    let first = *sorted.first()?;
    let last = *sorted.last()?;

    let mut high = first.high;
    let mut low = first.low;
    let mut volume = Decimal::ZERO;
    let mut amount = Decimal::ZERO;
    for bar in &sorted {
        high = high.max(bar.high);
        low = low.min(bar.low);
        volume += bar.volume;
        amount += bar.amount;
    }

    Some(PriceBar {
        entity_id: first.entity_id.clone(),
        granularity,
        period_date: last.period_date,
        open: first.open,
        high,
        low,
        close: last.close,
        pre_close: first.pre_close,
        volume,
        amount,
    })
}

/// 바 목록을 `granularity` 기간별로 묶어 기간마다 하나의 바로 집계합니다.
///
/// 결과는 기간 기준일 오름차순입니다.
pub fn group_into_periods(bars: &[PriceBar], granularity: Granularity) -> Vec<PriceBar> {
    let mut sorted: Vec<PriceBar> = bars.to_vec();
    sorted.sort_by_key(|b| b.period_date);

    let mut result = Vec::new();
    let mut bucket: Vec<PriceBar> = Vec::new();

    for bar in sorted {
        if let Some(head) = bucket.first() {
            if !granularity.same_period(head.period_date, bar.period_date) {
                result.extend(aggregate_bars(&bucket, granularity));
                bucket.clear();
            }
        }
        bucket.push(bar);
    }
    result.extend(aggregate_bars(&bucket, granularity));

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(day: u32, month: u32, open: Decimal, close: Decimal, high: Decimal, low: Decimal) -> PriceBar {
        PriceBar {
            entity_id: "000001.SZ".to_string(),
            granularity: Granularity::Daily,
            period_date: NaiveDate::from_ymd_opt(2024, month, day).unwrap(),
            open,
            high,
            low,
            close,
            pre_close: open,
            volume: dec!(100),
            amount: dec!(1000),
        }
    }

    #[test]
    fn test_aggregate_bars_order_independent() {
        let bars = vec![
            bar(10, 1, dec!(10.5), dec!(10.8), dec!(11.0), dec!(10.4)),
            bar(8, 1, dec!(10.0), dec!(10.2), dec!(10.3), dec!(9.9)),
            bar(9, 1, dec!(10.2), dec!(10.5), dec!(10.6), dec!(10.1)),
        ];

        let weekly = aggregate_bars(&bars, Granularity::Weekly).unwrap();
        assert_eq!(weekly.granularity, Granularity::Weekly);
        assert_eq!(weekly.period_date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(weekly.open, dec!(10.0));
        assert_eq!(weekly.close, dec!(10.8));
        assert_eq!(weekly.high, dec!(11.0));
        assert_eq!(weekly.low, dec!(9.9));
        assert_eq!(weekly.volume, dec!(300));
        assert_eq!(weekly.amount, dec!(3000));
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate_bars(&[], Granularity::Monthly).is_none());
    }

    #[test]
    fn test_group_into_periods() {
        let bars = vec![
            bar(30, 1, dec!(10), dec!(11), dec!(12), dec!(9)),
            bar(31, 1, dec!(11), dec!(12), dec!(13), dec!(10)),
            bar(1, 2, dec!(12), dec!(13), dec!(14), dec!(11)),
        ];

        let monthly = group_into_periods(&bars, Granularity::Monthly);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].period_date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(monthly[0].volume, dec!(200));
        assert_eq!(monthly[1].period_date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(monthly[1].open, dec!(12));
    }
}
