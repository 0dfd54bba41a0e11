//! 로깅 초기화.
//!
//! 출력 형식:
//! - **pretty**: 로컬 실행용
//! - **json**: 데몬 운영 (로그 수집기)
//! - **compact**: 한 줄 요약
//!
//! 작업/종목 컨텍스트는 [`sync_span!`](crate::sync_span)으로 붙입니다.

use thiserror::Error;
use tracing_subscriber::{
    filter::ParseError,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::Registry,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 초기화 에러.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("잘못된 로그 필터: {0}")]
    InvalidFilter(#[from] ParseError),

    #[error("로깅이 이미 초기화됨: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 필터 지시문 (예: "info", "sync_collector=debug,sync_executor=warn")
    pub level: String,
    pub format: LogFormat,
    /// 작업 span 진입/종료 이벤트 출력 (`LOG_SPAN_EVENTS`)
    pub with_span_events: bool,
    pub with_file: bool,
    /// 워커 스레드 ID 출력 (`LOG_THREAD_IDS`)
    pub with_thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_span_events: false,
            with_file: false,
            with_thread_ids: false,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// 환경 변수에서 설정을 읽습니다.
    ///
    /// `RUST_LOG`가 없으면 `default_level`을 씁니다. `LOG_FORMAT`,
    /// `LOG_SPAN_EVENTS`, `LOG_THREAD_IDS`는 선택입니다.
    pub fn from_env(default_level: &str) -> Self {
        let flag = |key: &str| {
            std::env::var(key)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false)
        };

        Self {
            level: std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string()),
            format: std::env::var("LOG_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            with_span_events: flag("LOG_SPAN_EVENTS"),
            with_file: false,
            with_thread_ids: flag("LOG_THREAD_IDS"),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.with_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// 전역 subscriber를 설치합니다. 프로세스당 한 번만 성공합니다.
///
/// ```no_run
/// use sync_core::logging::{init_logging, LogConfig, LogFormat};
///
/// let config = LogConfig::new("sync_collector=debug,info").with_format(LogFormat::Json);
/// init_logging(config).expect("logging");
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(&config.level)?;

    let base = fmt::layer()
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_thread_ids(config.with_thread_ids)
        .with_span_events(config.span_events());

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Json => base.json().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()?;

    tracing::debug!(format = ?config.format, filter = %config.level, "로깅 초기화 완료");
    Ok(())
}

/// 작업/종목/단위 필드를 가진 span.
///
/// ```ignore
/// async { ... }.instrument(sync_span!("sync_job", job)).await
/// ```
#[macro_export]
macro_rules! sync_span {
    ($name:expr, $job:expr) => {
        tracing::info_span!($name, job = %$job)
    };
    ($name:expr, $job:expr, $entity:expr) => {
        tracing::info_span!($name, job = %$job, entity = %$entity)
    };
    ($name:expr, $job:expr, $entity:expr, $granularity:expr) => {
        tracing::info_span!(
            $name,
            job = %$job,
            entity = %$entity,
            granularity = %$granularity
        )
    };
}
