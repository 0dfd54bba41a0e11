//! 작업 오케스트레이터.
//!
//! 작업 하나의 실행 단계:
//!
//! ```text
//! Idle → LoadEntities → BuildTasks → RunBatch → ReportStats → Idle
//! ```
//!
//! - 거래일 판정은 실행 시작 시 한 번 계산되어 모든 Task에 값으로 전달됩니다.
//! - 종목 목록 로드 실패는 작업 전체 실패(`CollectorError::Setup`)입니다.
//! - 종목 단위 실패는 `TaskResult`로 집계되고 재시도 단계를 거칩니다.
//! - 배치 마감 시간(`batch_timeout`)은 재시도 단계까지 포함한 상한입니다.
//! - 알림 실패는 로그만 남깁니다.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use sync_core::{sync_span, Collector, Entity, Repository, SyncError, SyncPolicy, TradingDayCheck};
use sync_executor::{CancellationToken, ExecutionStats, Task, TaskExecutor, TaskResult};
use sync_notification::Notifier;
use tokio::time::Instant;
use tracing::{error, info, warn, Instrument};

use crate::config::JobConfig;
use crate::error::{CollectorError, Result};
use crate::jobs::{
    holder_count_task, performance_report_task, price_sync_task, JobKind, PriceSyncContext,
    SnapshotContext,
};

/// 요약 알림에 포함하는 최대 실패 건수.
const MAX_FAILURES_IN_SUMMARY: usize = 5;

/// 재시도 단계가 쓸 수 있는 남은 배치 시간.
#[derive(Clone, Copy)]
struct RetryBudget<'a> {
    /// 이 작업 실행의 취소 범위
    scope: &'a CancellationToken,
    deadline: Option<Instant>,
}

impl RetryBudget<'_> {
    fn exhausted(&self) -> bool {
        self.deadline.is_some_and(|at| at <= Instant::now())
    }

    /// 마감 시각에 완료됩니다. 마감이 없으면 끝나지 않습니다.
    async fn expired(&self) {
        match self.deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

/// 작업 실행 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobPhase {
    Idle,
    LoadEntities,
    BuildTasks,
    RunBatch,
    ReportStats,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Idle => "idle",
            JobPhase::LoadEntities => "load_entities",
            JobPhase::BuildTasks => "build_tasks",
            JobPhase::RunBatch => "run_batch",
            JobPhase::ReportStats => "report_stats",
        };
        f.write_str(s)
    }
}

/// 종목 단위 실패.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task_id: String,
    pub error: SyncError,
}

/// 작업 실행 결과.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: JobKind,
    pub today: TradingDayCheck,
    /// 실행 대상 종목 수
    pub entities: usize,
    pub stats: ExecutionStats,
    pub failures: Vec<TaskFailure>,
    /// 비거래일이라 실행하지 않음
    pub skipped_non_trading_day: bool,
}

impl JobReport {
    fn non_trading_day(job: JobKind, today: TradingDayCheck) -> Self {
        Self {
            job,
            today,
            entities: 0,
            stats: ExecutionStats::empty(Utc::now()),
            failures: Vec::new(),
            skipped_non_trading_day: true,
        }
    }

    fn from_results(
        job: JobKind,
        today: TradingDayCheck,
        entities: usize,
        stats: ExecutionStats,
        results: &[TaskResult],
    ) -> Self {
        let failures = results
            .iter()
            .filter_map(|r| {
                r.error.clone().map(|error| TaskFailure {
                    task_id: r.task_id.clone(),
                    error,
                })
            })
            .collect();

        Self {
            job,
            today,
            entities,
            stats,
            failures,
            skipped_non_trading_day: false,
        }
    }

    /// 알림용 요약.
    pub fn summary(&self) -> String {
        if self.skipped_non_trading_day {
            return format!("[{}] {} 비거래일, 실행하지 않음", self.job, self.today.date);
        }

        let mut lines = vec![self.stats.summary_line(self.job.as_str())];
        for failure in self.failures.iter().take(MAX_FAILURES_IN_SUMMARY) {
            lines.push(format!("  - {}: {}", failure.task_id, failure.error));
        }
        if self.failures.len() > MAX_FAILURES_IN_SUMMARY {
            lines.push(format!(
                "  ... 외 {}건",
                self.failures.len() - MAX_FAILURES_IN_SUMMARY
            ));
        }
        lines.join("\n")
    }
}

/// 작업 오케스트레이터.
///
/// 협력 객체는 생성자로 주입됩니다.
pub struct Orchestrator {
    repository: Arc<dyn Repository>,
    collector: Arc<dyn Collector>,
    notifier: Arc<dyn Notifier>,
    policy: Arc<SyncPolicy>,
    jobs: BTreeMap<JobKind, JobConfig>,
    phases: Mutex<HashMap<JobKind, JobPhase>>,
    shutdown: CancellationToken,
}

/// 실행 중 단계를 기록하고, drop 시 Idle로 되돌립니다.
struct PhaseGuard<'a> {
    phases: &'a Mutex<HashMap<JobKind, JobPhase>>,
    job: JobKind,
}

impl PhaseGuard<'_> {
    fn set(&self, phase: JobPhase) {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.job, phase);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.set(JobPhase::Idle);
    }
}

impl Orchestrator {
    pub fn new(
        repository: Arc<dyn Repository>,
        collector: Arc<dyn Collector>,
        notifier: Arc<dyn Notifier>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            repository,
            collector,
            notifier,
            policy: Arc::new(policy),
            jobs: BTreeMap::new(),
            phases: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_job_config(mut self, job: JobKind, config: JobConfig) -> Self {
        self.jobs.insert(job, config);
        self
    }

    pub fn with_job_configs(mut self, configs: impl IntoIterator<Item = (JobKind, JobConfig)>) -> Self {
        self.jobs.extend(configs);
        self
    }

    pub fn job_config(&self, job: JobKind) -> JobConfig {
        self.jobs
            .get(&job)
            .cloned()
            .unwrap_or_else(|| JobConfig::defaults_for(job))
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// 종료 토큰. cancel 하면 실행 중인 모든 작업의 남은 Task가 취소됩니다.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 작업의 현재 실행 단계.
    pub fn phase(&self, job: JobKind) -> JobPhase {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job)
            .copied()
            .unwrap_or(JobPhase::Idle)
    }

    fn begin(&self, job: JobKind) -> Result<PhaseGuard<'_>> {
        let mut phases = self.phases.lock().unwrap_or_else(PoisonError::into_inner);
        let current = phases.get(&job).copied().unwrap_or(JobPhase::Idle);
        if current != JobPhase::Idle {
            return Err(CollectorError::AlreadyRunning(job));
        }
        phases.insert(job, JobPhase::LoadEntities);
        Ok(PhaseGuard {
            phases: &self.phases,
            job,
        })
    }

    /// 작업 하나를 실행합니다.
    pub async fn run_job(&self, job: JobKind, now: DateTime<Utc>) -> Result<JobReport> {
        let guard = self.begin(job)?;
        self.run_phases(job, now, &guard)
            .instrument(sync_span!("sync_job", job))
            .await
    }

    /// 모든 작업을 순서대로 실행합니다. 한 작업의 실패는 다음 작업을 막지 않습니다.
    pub async fn run_all(&self, now: DateTime<Utc>) -> Vec<(JobKind, Result<JobReport>)> {
        let mut outcomes = Vec::new();
        for job in JobKind::all() {
            let outcome = self.run_job(job, now).await;
            if let Err(e) = &outcome {
                error!(%job, error = %e, "작업 실패");
            }
            outcomes.push((job, outcome));
        }
        outcomes
    }

    async fn run_phases(
        &self,
        job: JobKind,
        now: DateTime<Utc>,
        guard: &PhaseGuard<'_>,
    ) -> Result<JobReport> {
        let today = self.policy.calendar().check(now);
        let config = self.job_config(job);

        if job.trading_days_only() && !today.is_trading_day {
            info!(date = %today.date, "비거래일, 작업 건너뜀");
            guard.set(JobPhase::ReportStats);
            let report = JobReport::non_trading_day(job, today);
            self.report(&report).await;
            return Ok(report);
        }

        // 1. 종목 로드
        guard.set(JobPhase::LoadEntities);
        let entities = self
            .repository
            .list_entities()
            .await
            .map_err(|e| CollectorError::Setup(format!("{} 종목 목록 로드 실패: {}", job, e)))?;
        let total = entities.len();
        let selected: Vec<Entity> = entities
            .into_iter()
            .filter(|e| !job.is_time_series() || e.active)
            .collect();
        info!(
            total,
            selected = selected.len(),
            date = %today.date,
            trading_day = today.is_trading_day,
            session_closed = today.session_closed,
            "종목 로드 완료"
        );

        // 2. Task 구성
        guard.set(JobPhase::BuildTasks);
        let tasks = self.build_tasks(job, &selected, &today);

        // 3. 배치 실행
        guard.set(JobPhase::RunBatch);
        let scope = self.shutdown.child_token();
        let deadline = config.batch_timeout.map(|limit| Instant::now() + limit);
        let executor = TaskExecutor::with_shutdown(config.executor_config(), scope.clone());
        let (mut results, mut stats) = executor.execute_batch(tasks.clone()).await;

        if config.max_retries > 0 {
            let budget = RetryBudget { scope: &scope, deadline };
            if let Some(updated) = self
                .retry_failed(&executor, &tasks, &mut results, &config, &stats, budget)
                .await
            {
                stats = updated;
            }
        }
        executor.close().await;

        // 4. 보고
        guard.set(JobPhase::ReportStats);
        let report = JobReport::from_results(job, today, selected.len(), stats, &results);
        self.report(&report).await;
        Ok(report)
    }

    fn build_tasks(&self, job: JobKind, entities: &[Entity], today: &TradingDayCheck) -> Vec<Task> {
        if let Some(granularity) = job.granularity() {
            let ctx = Arc::new(PriceSyncContext {
                policy: self.policy.clone(),
                collector: self.collector.clone(),
                repository: self.repository.clone(),
                today: *today,
            });
            return entities
                .iter()
                .map(|e| price_sync_task(ctx.clone(), &e.id, granularity))
                .collect();
        }

        let ctx = Arc::new(SnapshotContext {
            collector: self.collector.clone(),
            repository: self.repository.clone(),
        });
        entities
            .iter()
            .map(|e| match job {
                JobKind::HolderCount => holder_count_task(ctx.clone(), &e.id),
                _ => performance_report_task(ctx.clone(), &e.id),
            })
            .collect()
    }

    /// 재시도 가능한 실패만 다시 실행하고 결과를 제자리에 바꿉니다.
    ///
    /// 재시도 단계도 배치 마감 시각 안에서만 실행됩니다. 마감에 닿으면 `scope`를
    /// 취소해 진행 중인 시도를 마무리하고, 그때까지의 결과를 씁니다.
    /// 재시도한 작업이 있으면 다시 계산한 통계를 반환합니다.
    async fn retry_failed(
        &self,
        executor: &TaskExecutor,
        tasks: &[Task],
        results: &mut [TaskResult],
        config: &JobConfig,
        stats: &ExecutionStats,
        budget: RetryBudget<'_>,
    ) -> Option<ExecutionStats> {
        let retry_positions: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.error.as_ref().is_some_and(SyncError::is_retryable))
            .map(|(i, _)| i)
            .collect();

        if retry_positions.is_empty() {
            return None;
        }

        if budget.exhausted() {
            warn!(count = retry_positions.len(), "배치 마감 시간 소진, 재시도 생략");
            return None;
        }

        info!(
            count = retry_positions.len(),
            max_retries = config.max_retries,
            "재시도 단계 시작"
        );

        tokio::select! {
            _ = budget.scope.cancelled() => return None,
            _ = budget.expired() => {
                warn!("재시도 대기 중 배치 마감 시간 도달, 재시도 생략");
                return None;
            }
            _ = tokio::time::sleep(config.retry_delay) => {}
        }

        // 배치에서 1회 실행했으므로 남은 횟수만큼
        let remaining = config.max_retries - 1;
        let all = join_all(
            retry_positions
                .iter()
                .map(|&i| executor.execute_with_retry(&tasks[i], remaining, config.retry_delay)),
        );
        tokio::pin!(all);

        let retried = tokio::select! {
            retried = &mut all => retried,
            _ = budget.expired() => {
                warn!("재시도 중 배치 마감 시간 도달, 남은 재시도 취소");
                budget.scope.cancel();
                all.await
            }
        };

        let recovered = retried.iter().filter(|r| r.success).count();
        for (position, result) in retry_positions.into_iter().zip(retried) {
            results[position] = result;
        }
        info!(recovered, "재시도 단계 완료");

        Some(ExecutionStats::from_results(
            results,
            stats.start_time,
            Utc::now(),
        ))
    }

    async fn report(&self, report: &JobReport) {
        if !report.skipped_non_trading_day {
            report.stats.log_summary(report.job.as_str());
        }
        if let Err(e) = self.notifier.notify(&report.summary()).await {
            warn!(notifier = self.notifier.name(), error = %e, "알림 전송 실패");
        }
    }
}
