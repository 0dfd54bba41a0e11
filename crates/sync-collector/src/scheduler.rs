//! 작업 트리거 백엔드.
//!
//! - [`CronBackend`]: 스케줄 표의 cron 식마다 작업을 등록 (`tokio-cron-scheduler`, UTC)
//! - [`IntervalBackend`]: 고정 주기마다 표의 작업을 순서대로 실행

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{SchedulerBackendKind, SchedulerConfig};
use crate::error::{CollectorError, Result};
use crate::jobs::{JobKind, ScheduleTable};
use crate::orchestrator::Orchestrator;

/// 트리거 시 호출되는 작업 실행 함수.
pub type JobRunner = Arc<dyn Fn(JobKind) -> BoxFuture<'static, ()> + Send + Sync>;

/// 작업 트리거 백엔드.
#[async_trait]
pub trait SchedulerBackend: Send + Sync {
    fn name(&self) -> &str;

    /// `shutdown`이 취소될 때까지 스케줄에 따라 작업을 실행합니다.
    async fn run(
        &self,
        table: &ScheduleTable,
        runner: JobRunner,
        shutdown: CancellationToken,
    ) -> Result<()>;
}

/// 설정에 맞는 백엔드를 만듭니다.
pub fn backend_for(config: &SchedulerConfig) -> Box<dyn SchedulerBackend> {
    match config.backend {
        SchedulerBackendKind::Cron => Box::new(CronBackend),
        SchedulerBackendKind::Interval => Box::new(IntervalBackend::new(config.interval())),
    }
}

/// 오케스트레이터를 호출하는 실행 함수. 에러는 여기서 로그로 남깁니다.
pub fn orchestrator_runner(orchestrator: Arc<Orchestrator>) -> JobRunner {
    Arc::new(move |job| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move {
            match orchestrator.run_job(job, Utc::now()).await {
                Ok(report) => info!(
                    %job,
                    total = report.stats.total_tasks,
                    failed = report.stats.failed_tasks,
                    "작업 완료"
                ),
                Err(CollectorError::AlreadyRunning(_)) => {
                    warn!(%job, "이전 실행이 아직 진행 중, 이번 트리거는 건너뜀")
                }
                Err(e) => error!(%job, error = %e, "작업 실패"),
            }
        })
    })
}

/// cron 백엔드.
pub struct CronBackend;

impl CronBackend {
    fn build_jobs(table: &ScheduleTable, runner: &JobRunner) -> Result<Vec<Job>> {
        table
            .entries()
            .iter()
            .map(|entry| {
                let runner = runner.clone();
                let job = entry.job;
                Job::new_async(entry.cron.as_str(), move |_uuid, _l| {
                    let runner = runner.clone();
                    Box::pin(async move {
                        runner(job).await;
                    })
                })
                .map_err(|e| {
                    CollectorError::Scheduler(format!(
                        "{} 작업 생성 실패 (cron: {}): {}",
                        entry.job, entry.cron, e
                    ))
                })
            })
            .collect()
    }
}

#[async_trait]
impl SchedulerBackend for CronBackend {
    fn name(&self) -> &str {
        "cron"
    }

    async fn run(
        &self,
        table: &ScheduleTable,
        runner: JobRunner,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let jobs = Self::build_jobs(table, &runner)?;
        let mut scheduler = JobScheduler::new().await?;

        for (job, entry) in jobs.into_iter().zip(table.entries()) {
            scheduler.add(job).await?;
            info!(
                job = %entry.job,
                cron = %entry.cron,
                description = %entry.description,
                "스케줄 등록"
            );
        }

        scheduler.start().await?;
        info!(jobs = table.entries().len(), "cron 스케줄러 시작");

        shutdown.cancelled().await;

        info!("cron 스케줄러 종료 중...");
        scheduler.shutdown().await?;
        Ok(())
    }
}

/// 고정 주기 백엔드.
pub struct IntervalBackend {
    period: Duration,
}

impl IntervalBackend {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_secs(1)),
        }
    }
}

#[async_trait]
impl SchedulerBackend for IntervalBackend {
    fn name(&self) -> &str {
        "interval"
    }

    async fn run(
        &self,
        table: &ScheduleTable,
        runner: JobRunner,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!(period_secs = self.period.as_secs(), "interval 스케줄러 시작");

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("종료 신호 수신, interval 스케줄러 종료");
                    break;
                }
                _ = interval.tick() => {
                    info!("=== 워크플로우 실행 시작 ===");
                    for job in table.jobs() {
                        if shutdown.is_cancelled() {
                            break;
                        }
                        runner(job).await;
                    }
                    info!(
                        next_in_secs = self.period.as_secs(),
                        "=== 워크플로우 완료 ==="
                    );
                }
            }
        }
        Ok(())
    }
}
