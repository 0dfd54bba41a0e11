//! HTTP 데이터 공급자 (Tushare 표 프로토콜).
//!
//! 요청:
//!
//! ```json
//! {"api_name": "daily", "token": "...", "params": {"ts_code": "000001.SZ"}, "fields": "ts_code,trade_date,..."}
//! ```
//!
//! 응답:
//!
//! ```json
//! {"code": 0, "msg": "", "data": {"fields": ["ts_code", "trade_date"], "items": [["000001.SZ", "20240105"]]}}
//! ```
//!
//! 연봉은 월봉을, 진행 중인 기간 스냅샷은 일봉을 기간 단위로 집계해 만듭니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};
use sync_core::{
    aggregate_bars, format_period_key, group_into_periods, parse_period_date, Collector,
    Granularity, HolderCount, PerformanceReport, PriceBar, SyncError, SyncResult, SyncWindow,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ProviderConfig;

const BAR_FIELDS: &str = "ts_code,trade_date,open,high,low,close,pre_close,vol,amount";
const HOLDER_FIELDS: &str = "ts_code,ann_date,end_date,holder_num";
const EXPRESS_FIELDS: &str = "ts_code,ann_date,end_date,revenue,n_income,diluted_eps,diluted_roe";

#[derive(Debug, Deserialize)]
struct TableResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<Table>,
}

/// 열 이름 + 행 목록.
#[derive(Debug, Default, Deserialize)]
struct Table {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

impl Table {
    /// 행마다 `parse`를 적용합니다. 하나라도 실패하면 전체가 실패합니다.
    fn parse_rows<T>(&self, mut parse: impl FnMut(&Row<'_>) -> SyncResult<T>) -> SyncResult<Vec<T>> {
        let index: HashMap<&str, usize> = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.as_str(), i))
            .collect();
        self.items
            .iter()
            .map(|values| parse(&Row { index: &index, values }))
            .collect()
    }
}

struct Row<'a> {
    index: &'a HashMap<&'a str, usize>,
    values: &'a [Value],
}

impl Row<'_> {
    fn value(&self, field: &str) -> Option<&Value> {
        self.index
            .get(field)
            .and_then(|&i| self.values.get(i))
            .filter(|v| !v.is_null())
    }

    fn string(&self, field: &str) -> SyncResult<String> {
        match self.value(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(SyncError::Parse(format!("필드 누락: {}", field))),
        }
    }

    fn date(&self, field: &str) -> SyncResult<NaiveDate> {
        parse_period_date(&self.string(field)?)
    }

    fn optional_date(&self, field: &str) -> SyncResult<Option<NaiveDate>> {
        self.value(field).map(|_| self.date(field)).transpose()
    }

    fn decimal(&self, field: &str) -> SyncResult<Decimal> {
        self.optional_decimal(field)?
            .ok_or_else(|| SyncError::Parse(format!("필드 누락: {}", field)))
    }

    fn optional_decimal(&self, field: &str) -> SyncResult<Option<Decimal>> {
        let Some(value) = self.value(field) else {
            return Ok(None);
        };
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map(Some)
            .map_err(|e| SyncError::Parse(format!("{} 숫자 변환 실패 '{}': {}", field, text, e)))
    }
}

/// HTTP 공급자.
pub struct HttpCollector {
    client: reqwest::Client,
    api_url: String,
    token: String,
    request_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpCollector {
    pub fn new(config: &ProviderConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::Fetch(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            token: config.api_token.clone(),
            request_delay: config.request_delay(),
            last_request: Mutex::new(None),
        })
    }

    /// 요청 간 최소 간격을 지킵니다.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < self.request_delay {
                tokio::time::sleep(self.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn query(&self, api_name: &str, params: Value, fields: &str) -> SyncResult<Table> {
        self.throttle().await;

        let body = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": fields,
        });
        debug!(api = api_name, params = %body["params"], "공급자 요청");

        let response = self
            .client
            .post(&self.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Fetch(format!("{} 요청 실패: {}", api_name, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Fetch(format!("{} HTTP {}: {}", api_name, status, text)));
        }

        let parsed: TableResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("{} 응답 형식 오류: {}", api_name, e)))?;

        if parsed.code != 0 {
            return Err(SyncError::Fetch(format!(
                "{} 공급자 오류 {}: {}",
                api_name,
                parsed.code,
                parsed.msg.unwrap_or_default()
            )));
        }

        Ok(parsed.data.unwrap_or_default())
    }

    /// 한 단위의 바를 날짜 오름차순으로 조회합니다.
    async fn bars(
        &self,
        entity_id: &str,
        api_granularity: Granularity,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SyncResult<Vec<PriceBar>> {
        let api_name = match api_granularity {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly | Granularity::Yearly => "monthly",
        };
        let params = json!({
            "ts_code": entity_id,
            "start_date": format_period_key(start),
            "end_date": format_period_key(end),
        });

        let table = self.query(api_name, params, BAR_FIELDS).await?;
        let mut bars = table.parse_rows(|row| parse_bar(row, entity_id, api_granularity))?;
        bars.sort_by_key(|b| b.period_date);
        Ok(bars)
    }
}

fn parse_bar(row: &Row<'_>, entity_id: &str, granularity: Granularity) -> SyncResult<PriceBar> {
    Ok(PriceBar {
        entity_id: entity_id.to_string(),
        granularity,
        period_date: row.date("trade_date")?,
        open: row.decimal("open")?,
        high: row.decimal("high")?,
        low: row.decimal("low")?,
        close: row.decimal("close")?,
        pre_close: row.optional_decimal("pre_close")?.unwrap_or_default(),
        volume: row.optional_decimal("vol")?.unwrap_or_default(),
        amount: row.optional_decimal("amount")?.unwrap_or_default(),
    })
}

#[async_trait]
impl Collector for HttpCollector {
    async fn fetch(&self, entity_id: &str, window: &SyncWindow) -> SyncResult<Vec<PriceBar>> {
        match window.granularity {
            Granularity::Yearly => {
                // 연봉 API가 없으므로 월봉을 연 단위로 집계
                let start = Granularity::Yearly.period_start(window.start_date);
                let monthly = self
                    .bars(entity_id, Granularity::Monthly, start, window.end_date)
                    .await?;
                Ok(group_into_periods(&monthly, Granularity::Yearly))
            }
            granularity => {
                self.bars(entity_id, granularity, window.start_date, window.end_date)
                    .await
            }
        }
    }

    async fn fetch_current_period(
        &self,
        entity_id: &str,
        granularity: Granularity,
        as_of: NaiveDate,
    ) -> SyncResult<Option<PriceBar>> {
        let start = granularity.period_start(as_of);
        let daily = self
            .bars(entity_id, Granularity::Daily, start, as_of)
            .await?;
        Ok(aggregate_bars(&daily, granularity))
    }

    async fn fetch_holder_counts(&self, entity_id: &str) -> SyncResult<Vec<HolderCount>> {
        let table = self
            .query("stk_holdernumber", json!({ "ts_code": entity_id }), HOLDER_FIELDS)
            .await?;

        let mut rows = table.parse_rows(|row| {
            let holder_num = row.decimal("holder_num")?;
            Ok(HolderCount {
                entity_id: entity_id.to_string(),
                end_date: row.date("end_date")?,
                holder_num: i64::try_from(holder_num.trunc()).map_err(|e| {
                    SyncError::Parse(format!("holder_num 범위 오류 {}: {}", holder_num, e))
                })?,
            })
        })?;
        rows.sort_by_key(|r| r.end_date);
        // 같은 기준일의 정정 공시는 마지막 값만 유지
        rows.dedup_by(|later, earlier| {
            if later.end_date == earlier.end_date {
                earlier.holder_num = later.holder_num;
                true
            } else {
                false
            }
        });
        Ok(rows)
    }

    async fn fetch_performance_reports(&self, entity_id: &str) -> SyncResult<Vec<PerformanceReport>> {
        let table = self
            .query("express", json!({ "ts_code": entity_id }), EXPRESS_FIELDS)
            .await?;

        let mut rows = table.parse_rows(|row| {
            Ok(PerformanceReport {
                entity_id: entity_id.to_string(),
                end_date: row.date("end_date")?,
                ann_date: row.optional_date("ann_date")?,
                revenue: row.optional_decimal("revenue")?,
                net_profit: row.optional_decimal("n_income")?,
                eps: row.optional_decimal("diluted_eps")?,
                roe: row.optional_decimal("diluted_roe")?,
            })
        })?;
        rows.sort_by_key(|r| r.end_date);
        Ok(rows)
    }
}
