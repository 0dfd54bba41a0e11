//! 통합 테스트용 인메모리 저장소/공급자/알림.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sync_collector::{JobConfig, JobKind, Orchestrator};
use sync_core::{
    format_period_key, Collector, Entity, Granularity, HolderCount, LatestRecord,
    PerformanceReport, PriceBar, Repository, SyncError, SyncPolicy, SyncPolicyConfig,
    SyncResult, SyncWindow, TradingCalendar,
};
use sync_notification::{NotificationError, NotificationResult, Notifier};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// UTC 시각.
pub fn at(y: i32, m: u32, day: u32, hour: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, day, hour, 0, 0).unwrap()
}

pub fn bar(entity_id: &str, granularity: Granularity, date: NaiveDate) -> PriceBar {
    PriceBar {
        entity_id: entity_id.to_string(),
        granularity,
        period_date: date,
        open: Decimal::new(1000, 2),
        high: Decimal::new(1100, 2),
        low: Decimal::new(950, 2),
        close: Decimal::new(1050, 2),
        pre_close: Decimal::new(1000, 2),
        volume: Decimal::new(12345, 0),
        amount: Decimal::new(1296225, 1),
    }
}

/// 저장소와 공급자 호출을 순서대로 기록하는 저널.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

// ==================== Repository ====================

#[derive(Default)]
pub struct FakeRepository {
    pub journal: Journal,
    pub entities: Mutex<Vec<Entity>>,
    /// (종목, 단위) → 저장 키 목록
    pub keys: Mutex<HashMap<(String, Granularity), Vec<String>>>,
    /// (종목, 단위, 키) → 기록 시각
    pub written_at: Mutex<HashMap<(String, Granularity, String), DateTime<Utc>>>,
    pub status: Mutex<HashMap<String, bool>>,
    pub holder_rows: Mutex<Vec<HolderCount>>,
    pub report_rows: Mutex<Vec<PerformanceReport>>,
    pub fail_list: bool,
    pub fail_status_update: bool,
}

impl FakeRepository {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn with_entity(self, id: &str, active: bool) -> Self {
        self.entities.lock().unwrap().push(Entity {
            id: id.to_string(),
            name: id.to_string(),
            active,
        });
        self
    }

    pub fn with_key(self, id: &str, granularity: Granularity, key: &str) -> Self {
        self.keys
            .lock()
            .unwrap()
            .entry((id.to_string(), granularity))
            .or_default()
            .push(key.to_string());
        self
    }

    /// 기록 시각이 있는 키.
    pub fn with_key_at(
        self,
        id: &str,
        granularity: Granularity,
        key: &str,
        written_at: DateTime<Utc>,
    ) -> Self {
        self.written_at
            .lock()
            .unwrap()
            .insert((id.to_string(), granularity, key.to_string()), written_at);
        self.with_key(id, granularity, key)
    }

    pub fn keys_of(&self, id: &str, granularity: Granularity) -> Vec<String> {
        let mut keys = self
            .keys
            .lock()
            .unwrap()
            .get(&(id.to_string(), granularity))
            .cloned()
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn status_of(&self, id: &str) -> Option<bool> {
        self.status.lock().unwrap().get(id).copied()
    }
}

#[async_trait]
impl Repository for FakeRepository {
    async fn list_entities(&self) -> SyncResult<Vec<Entity>> {
        self.journal.push("list_entities".to_string());
        if self.fail_list {
            return Err(SyncError::Repository("connection refused".into()));
        }
        Ok(self.entities.lock().unwrap().clone())
    }

    async fn get_latest(
        &self,
        entity_id: &str,
        granularity: Granularity,
    ) -> SyncResult<Option<LatestRecord>> {
        self.journal
            .push(format!("get_latest {} {}", granularity, entity_id));
        let keys = self.keys_of(entity_id, granularity);
        let written_at = self.written_at.lock().unwrap();
        Ok(keys.last().map(|key| LatestRecord {
            entity_id: entity_id.to_string(),
            granularity,
            last_period_date: key.clone(),
            updated_at: written_at
                .get(&(entity_id.to_string(), granularity, key.clone()))
                .copied(),
        }))
    }

    async fn delete(
        &self,
        entity_id: &str,
        period_date: NaiveDate,
        granularity: Granularity,
    ) -> SyncResult<()> {
        self.journal.push(format!(
            "delete {} {} {}",
            granularity,
            entity_id,
            format_period_key(period_date)
        ));
        if let Some(keys) = self
            .keys
            .lock()
            .unwrap()
            .get_mut(&(entity_id.to_string(), granularity))
        {
            let key = format_period_key(period_date);
            let dashed = period_date.format("%Y-%m-%d").to_string();
            keys.retain(|k| *k != key && *k != dashed);
        }
        Ok(())
    }

    async fn upsert_batch(&self, rows: &[PriceBar]) -> SyncResult<usize> {
        let mut keys = self.keys.lock().unwrap();
        for row in rows {
            let key = format_period_key(row.period_date);
            self.journal.push(format!(
                "upsert {} {} {}",
                row.granularity, row.entity_id, key
            ));
            self.written_at.lock().unwrap().insert(
                (row.entity_id.clone(), row.granularity, key.clone()),
                Utc::now(),
            );
            let entry = keys
                .entry((row.entity_id.clone(), row.granularity))
                .or_default();
            if !entry.contains(&key) {
                entry.push(key);
            }
        }
        Ok(rows.len())
    }

    async fn update_status(&self, entity_id: &str, active: bool) -> SyncResult<()> {
        self.journal
            .push(format!("update_status {} {}", entity_id, active));
        if self.fail_status_update {
            return Err(SyncError::Repository("read-only".into()));
        }
        self.status
            .lock()
            .unwrap()
            .insert(entity_id.to_string(), active);
        Ok(())
    }

    async fn upsert_holder_counts(&self, rows: &[HolderCount]) -> SyncResult<usize> {
        self.journal.push(format!("upsert_holders {}", rows.len()));
        self.holder_rows.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len())
    }

    async fn upsert_performance_reports(&self, rows: &[PerformanceReport]) -> SyncResult<usize> {
        self.journal.push(format!("upsert_reports {}", rows.len()));
        self.report_rows.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len())
    }
}

// ==================== Collector ====================

/// 종목별 공급자 응답.
#[derive(Clone)]
pub enum Scripted {
    Bars(Vec<PriceBar>),
    /// 처음 n번은 Fetch 에러, 이후 바 반환
    FailTimes(usize, Vec<PriceBar>),
    Error(SyncError),
    Slow(Duration, Vec<PriceBar>),
}

#[derive(Default)]
pub struct FakeCollector {
    pub journal: Journal,
    pub scripts: Mutex<HashMap<String, Scripted>>,
    pub current: Mutex<HashMap<String, PriceBar>>,
    pub windows: Mutex<Vec<SyncWindow>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeCollector {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn script(self, entity_id: &str, script: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(entity_id.to_string(), script);
        self
    }

    pub fn current_bar(self, bar: PriceBar) -> Self {
        self.current
            .lock()
            .unwrap()
            .insert(bar.entity_id.clone(), bar);
        self
    }

    pub fn calls_for(&self, entity_id: &str) -> usize {
        self.calls.lock().unwrap().get(entity_id).copied().unwrap_or(0)
    }

    fn next_call(&self, entity_id: &str) -> usize {
        let mut calls = self.calls.lock().unwrap();
        let count = calls.entry(entity_id.to_string()).or_default();
        *count += 1;
        *count
    }
}

#[async_trait]
impl Collector for FakeCollector {
    async fn fetch(&self, entity_id: &str, window: &SyncWindow) -> SyncResult<Vec<PriceBar>> {
        self.journal.push(format!(
            "fetch {} {} {}..{}",
            window.granularity,
            entity_id,
            format_period_key(window.start_date),
            format_period_key(window.end_date)
        ));
        self.windows.lock().unwrap().push(window.clone());
        let call = self.next_call(entity_id);

        let script = self.scripts.lock().unwrap().get(entity_id).cloned();
        match script {
            None => Ok(Vec::new()),
            Some(Scripted::Bars(bars)) => Ok(bars),
            Some(Scripted::FailTimes(n, bars)) => {
                if call <= n {
                    Err(SyncError::Fetch(format!("503 (attempt {})", call)))
                } else {
                    Ok(bars)
                }
            }
            Some(Scripted::Error(e)) => Err(e),
            Some(Scripted::Slow(delay, bars)) => {
                tokio::time::sleep(delay).await;
                Ok(bars)
            }
        }
    }

    async fn fetch_current_period(
        &self,
        entity_id: &str,
        granularity: Granularity,
        as_of: NaiveDate,
    ) -> SyncResult<Option<PriceBar>> {
        self.journal.push(format!(
            "fetch_current {} {} {}",
            granularity,
            entity_id,
            format_period_key(as_of)
        ));
        Ok(self.current.lock().unwrap().get(entity_id).cloned())
    }

    async fn fetch_holder_counts(&self, entity_id: &str) -> SyncResult<Vec<HolderCount>> {
        self.journal.push(format!("fetch_holders {}", entity_id));
        Ok(vec![HolderCount {
            entity_id: entity_id.to_string(),
            end_date: d(2023, 12, 31),
            holder_num: 1000,
        }])
    }

    async fn fetch_performance_reports(
        &self,
        entity_id: &str,
    ) -> SyncResult<Vec<PerformanceReport>> {
        self.journal.push(format!("fetch_reports {}", entity_id));
        Ok(Vec::new())
    }
}

// ==================== Notifier ====================

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, summary: &str) -> NotificationResult<()> {
        self.messages.lock().unwrap().push(summary.to_string());
        if self.fail {
            return Err(NotificationError::SendFailed("webhook down".into()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// ==================== Wiring ====================

/// 재시도 지연 없는 작업 설정.
pub fn fast_job(kind: JobKind) -> JobConfig {
    JobConfig {
        retry_delay: Duration::ZERO,
        ..JobConfig::defaults_for(kind)
    }
}

pub fn orchestrator(
    repository: Arc<FakeRepository>,
    collector: Arc<FakeCollector>,
    notifier: Arc<RecordingNotifier>,
) -> Orchestrator {
    let policy = SyncPolicy::new(TradingCalendar::new(), SyncPolicyConfig::default());
    Orchestrator::new(repository, collector, notifier, policy)
        .with_job_configs(JobKind::all().into_iter().map(|k| (k, fast_job(k))))
}
