//! Market data sync CLI.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use sync_collector::adapters::{HttpCollector, PgRepository};
use sync_collector::{
    backend_for, orchestrator_runner, CollectorConfig, JobKind, JobReport, Orchestrator,
};
use sync_core::{init_logging, LogConfig, LogFormat, SyncPolicy};
use sync_notification::{LogNotifier, NotificationManager, WebhookNotifier};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "sync-collector")]
#[command(about = "Market data sync collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 로그 형식 (pretty, compact, json)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// 작업 하나를 즉시 실행
    Run {
        /// 작업 이름 (예: daily_price)
        job: JobKind,
    },

    /// 모든 작업을 순서대로 실행
    RunAll,

    /// 데몬 모드: 스케줄에 따라 작업 실행
    Daemon,

    /// 작업 목록과 스케줄 출력
    ListJobs,

    /// 테이블 생성
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    let mut log_config = LogConfig::from_env(&format!(
        "sync_collector={level},sync_executor={level},sync_core={level}",
        level = cli.log_level
    ));
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format);
    }
    init_logging(log_config).context("로깅 초기화 실패")?;

    tracing::info!("Market Sync Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env().context("설정 로드 실패")?;

    if let Commands::ListJobs = cli.command {
        print_jobs(&config)?;
        return Ok(());
    }

    // DB 연결
    let repository = PgRepository::connect(&config.database_url, config.database_max_connections)
        .await
        .context("데이터베이스 연결 실패")?;
    tracing::info!("데이터베이스 연결 성공");

    if let Commands::InitDb = cli.command {
        repository.ensure_schema().await?;
        repository.close().await;
        return Ok(());
    }

    let collector = HttpCollector::new(&config.provider)?;
    let notifier = build_notifier()?;
    let policy = SyncPolicy::new(config.trading_calendar(), config.policy_config());

    let orchestrator = Arc::new(
        Orchestrator::new(
            Arc::new(repository.clone()),
            Arc::new(collector),
            Arc::new(notifier),
            policy,
        )
        .with_job_configs(config.jobs.clone()),
    );

    // 명령 실행
    match cli.command {
        Commands::Run { job } => {
            let report = orchestrator.run_job(job, Utc::now()).await?;
            print_report(&report);
        }
        Commands::RunAll => {
            tracing::info!("=== 전체 작업 시작 ===");
            for (job, outcome) in orchestrator.run_all(Utc::now()).await {
                match outcome {
                    Ok(report) => print_report(&report),
                    Err(e) => eprintln!("[{}] 실패: {}", job, e),
                }
            }
            tracing::info!("=== 전체 작업 완료 ===");
        }
        Commands::Daemon => {
            let table = config.schedule_table()?;
            let backend = backend_for(&config.scheduler);
            let shutdown = CancellationToken::new();

            tracing::info!(
                backend = backend.name(),
                jobs = table.entries().len(),
                "=== 데몬 모드 시작 ==="
            );

            let signal_token = shutdown.clone();
            let job_token = orchestrator.shutdown_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("종료 신호 수신, 데몬 종료 중...");
                    job_token.cancel();
                    signal_token.cancel();
                }
            });

            backend
                .run(&table, orchestrator_runner(orchestrator.clone()), shutdown)
                .await?;
        }
        Commands::ListJobs | Commands::InitDb => {}
    }

    repository.close().await;
    tracing::info!("Market Sync Collector 종료");

    Ok(())
}

/// webhook이 설정되어 있으면 함께 사용합니다.
fn build_notifier() -> anyhow::Result<NotificationManager> {
    let mut manager = NotificationManager::new().with(LogNotifier);
    if let Some(webhook) = WebhookNotifier::from_env() {
        manager.add(webhook.context("webhook 알림 설정 오류")?);
    }
    Ok(manager)
}

fn print_jobs(config: &CollectorConfig) -> anyhow::Result<()> {
    let table = config.schedule_table()?;
    println!(
        "{:<20} {:<8} {:<12} {:<22} {}",
        "JOB", "ENABLED", "CONCURRENCY", "SCHEDULE (UTC)", "DESCRIPTION"
    );
    for job in JobKind::all() {
        let job_config = config.job(job);
        let schedule = table
            .get(job)
            .map(|e| e.cron.as_str())
            .unwrap_or("-");
        println!(
            "{:<20} {:<8} {:<12} {:<22} {}",
            job.as_str(),
            job_config.enabled,
            job_config.concurrency,
            schedule,
            job.description()
        );
    }
    Ok(())
}

fn print_report(report: &JobReport) {
    println!("{}", report.summary());
}
