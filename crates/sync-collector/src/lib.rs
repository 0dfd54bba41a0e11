//! 시장 데이터 동기화 수집기.
//!
//! 이 crate는 스케줄에 따라 동기화 작업을 실행하는 바이너리와 그 구성 요소를 제공합니다:
//! - 작업 정의 (일/주/월/연봉, 주주 수, 실적 속보)
//! - 오케스트레이터 (종목 로드 → Task 구성 → 배치 실행 → 보고)
//! - 스케줄러 백엔드 (cron, interval)
//! - 어댑터 (PostgreSQL 저장소, HTTP 공급자)

pub mod adapters;
pub mod config;
pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod scheduler;

pub use config::{CollectorConfig, JobConfig};
pub use error::{CollectorError, Result};
pub use jobs::{JobKind, ScheduleEntry, ScheduleTable};
pub use orchestrator::{JobPhase, JobReport, Orchestrator, TaskFailure};
pub use scheduler::{backend_for, orchestrator_runner, JobRunner, SchedulerBackend};
