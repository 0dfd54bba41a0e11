//! 환경변수 기반 설정 모듈.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use sync_core::{HolidayRange, SyncPolicyConfig, TradingCalendar};
use sync_executor::ExecutorConfig;

use crate::error::{CollectorError, Result};
use crate::jobs::{JobKind, ScheduleEntry, ScheduleTable};

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// DB 커넥션 풀 크기
    pub database_max_connections: u32,
    /// 데이터 공급자 설정
    pub provider: ProviderConfig,
    /// 거래일 캘린더 설정
    pub calendar: CalendarConfig,
    /// 비활성 판정 기준 일수
    pub stale_days: i64,
    /// 작업별 설정
    pub jobs: BTreeMap<JobKind, JobConfig>,
    /// 스케줄러 설정
    pub scheduler: SchedulerConfig,
}

/// 데이터 공급자 설정
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API 엔드포인트
    pub api_url: String,
    /// API 토큰
    pub api_token: String,
    /// 요청 간 최소 간격 (밀리초)
    pub request_delay_ms: u64,
    /// HTTP 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

/// 거래일 캘린더 설정
#[derive(Debug, Clone, Default)]
pub struct CalendarConfig {
    /// 기본 휴장일(신정, 국경절)에 추가되는 휴장 구간
    pub extra_holidays: Vec<HolidayRange>,
}

/// 작업별 실행 설정
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    /// 스케줄 등록 여부
    pub enabled: bool,
    /// 최대 동시 실행 수
    pub concurrency: usize,
    /// 종목당 타임아웃
    pub task_timeout: Duration,
    /// 배치 전체 마감 시간
    pub batch_timeout: Option<Duration>,
    /// 재시도 횟수 (배치 후 재시도 단계)
    pub max_retries: u32,
    /// 재시도 간격
    pub retry_delay: Duration,
    /// cron 식 (UTC)
    pub schedule: String,
}

/// 스케줄러 백엔드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerBackendKind {
    /// cron 식에 따라 작업별로 실행
    Cron,
    /// 고정 주기로 모든 작업을 순서대로 실행
    Interval,
}

impl FromStr for SchedulerBackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cron" => Ok(Self::Cron),
            "interval" => Ok(Self::Interval),
            _ => Err(format!("Unknown scheduler backend: {}", s)),
        }
    }
}

/// 스케줄러 설정
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub backend: SchedulerBackendKind,
    /// interval 백엔드 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;

        let extra_holidays = match std::env::var("CALENDAR_HOLIDAYS") {
            Ok(raw) => parse_holidays(&raw)?,
            Err(_) => Vec::new(),
        };

        let backend = match std::env::var("SCHEDULER_BACKEND") {
            Ok(raw) => raw.parse().map_err(CollectorError::Config)?,
            Err(_) => SchedulerBackendKind::Cron,
        };

        let mut jobs = BTreeMap::new();
        for kind in JobKind::all() {
            jobs.insert(kind, JobConfig::from_env(kind)?);
        }

        Ok(Self {
            database_url,
            database_max_connections: env_var_parse("DATABASE_MAX_CONNECTIONS", 16),
            provider: ProviderConfig {
                api_url: std::env::var("COLLECTOR_API_URL")
                    .unwrap_or_else(|_| "http://api.tushare.pro".to_string()),
                api_token: std::env::var("COLLECTOR_API_TOKEN").unwrap_or_default(),
                request_delay_ms: env_var_parse("COLLECTOR_REQUEST_DELAY_MS", 120),
                request_timeout_secs: env_var_parse("COLLECTOR_REQUEST_TIMEOUT_SECS", 30),
            },
            calendar: CalendarConfig { extra_holidays },
            stale_days: env_var_parse("SYNC_STALE_DAYS", 30),
            jobs,
            scheduler: SchedulerConfig {
                backend,
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 60),
            },
        })
    }

    /// 작업 설정 (없으면 기본값)
    pub fn job(&self, kind: JobKind) -> JobConfig {
        self.jobs
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| JobConfig::defaults_for(kind))
    }

    /// 활성화된 작업의 스케줄 표
    pub fn schedule_table(&self) -> Result<ScheduleTable> {
        JobKind::all()
            .into_iter()
            .map(|kind| (kind, self.job(kind)))
            .filter(|(_, job)| job.enabled)
            .map(|(kind, job)| ScheduleEntry::new(kind, job.schedule))
            .collect::<Result<Vec<_>>>()
            .map(ScheduleTable::new)
    }

    pub fn trading_calendar(&self) -> TradingCalendar {
        self.calendar.build()
    }

    pub fn policy_config(&self) -> SyncPolicyConfig {
        SyncPolicyConfig {
            stale_after_days: self.stale_days,
            ..SyncPolicyConfig::default()
        }
    }
}

impl CalendarConfig {
    pub fn build(&self) -> TradingCalendar {
        TradingCalendar::new().with_holidays(self.extra_holidays.iter().copied())
    }
}

impl ProviderConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl JobConfig {
    /// 작업별 기본값
    pub fn defaults_for(kind: JobKind) -> Self {
        Self {
            enabled: true,
            concurrency: kind.default_concurrency(),
            task_timeout: Duration::from_secs(120),
            batch_timeout: Some(Duration::from_secs(120 * 60)),
            max_retries: 2,
            retry_delay: Duration::from_secs(5),
            schedule: kind.default_schedule().to_string(),
        }
    }

    /// `JOB_<NAME>_*` 환경변수로 기본값을 덮어씁니다.
    pub fn from_env(kind: JobKind) -> Result<Self> {
        let prefix = kind.env_prefix();
        let defaults = Self::defaults_for(kind);
        let key = |suffix: &str| format!("{}{}", prefix, suffix);

        let batch_timeout_mins: u64 = env_var_parse(
            &key("BATCH_TIMEOUT_MINS"),
            defaults.batch_timeout.map_or(0, |d| d.as_secs() / 60),
        );

        let job = Self {
            enabled: env_var_bool(&key("ENABLED"), defaults.enabled),
            concurrency: env_var_parse(&key("CONCURRENCY"), defaults.concurrency),
            task_timeout: Duration::from_secs(env_var_parse(
                &key("TASK_TIMEOUT_SECS"),
                defaults.task_timeout.as_secs(),
            )),
            // 0이면 마감 없음
            batch_timeout: (batch_timeout_mins > 0)
                .then(|| Duration::from_secs(batch_timeout_mins * 60)),
            max_retries: env_var_parse(&key("MAX_RETRIES"), defaults.max_retries),
            retry_delay: Duration::from_secs(env_var_parse(
                &key("RETRY_DELAY_SECS"),
                defaults.retry_delay.as_secs(),
            )),
            schedule: std::env::var(key("SCHEDULE")).unwrap_or(defaults.schedule),
        };

        if job.concurrency == 0 {
            return Err(CollectorError::Config(format!(
                "{}CONCURRENCY는 1 이상이어야 합니다",
                prefix
            )));
        }
        Ok(job)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        let config = ExecutorConfig::new(self.concurrency, self.task_timeout);
        match self.batch_timeout {
            Some(limit) => config.with_batch_timeout(limit),
            None => config,
        }
    }
}

impl SchedulerConfig {
    /// interval 백엔드 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// `CALENDAR_HOLIDAYS` 파싱: 쉼표로 구분된 휴장 구간 목록.
///
/// 예: `2024-02-09..2024-02-17,2024-04-04..2024-04-06,05-01..05-05`
pub fn parse_holidays(raw: &str) -> Result<Vec<HolidayRange>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<HolidayRange>().map_err(CollectorError::Config))
        .collect()
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
