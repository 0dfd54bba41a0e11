//! 가격 바 증분 동기화 작업.
//!
//! 종목 하나에 대한 흐름:
//!
//! ```text
//! SyncPolicy::compute_window
//!     ├─ Skip                  → 종료
//!     ├─ RangeFetch            → Collector::fetch(window)
//!     └─ RefreshCurrentPeriod  → Repository::delete(stale_key) → Collector::fetch_current_period
//!                                   │
//!                        Repository::upsert_batch
//!                                   │
//!                     (일봉) 비활성 판정 → update_status(false)
//! ```

use chrono::NaiveDate;
use std::sync::Arc;
use sync_core::{
    parse_period_date, Collector, Granularity, PriceBar, Repository, SyncError, SyncMode,
    SyncPolicy, SyncResult, TradingDayCheck,
};
use sync_executor::{CancellationToken, Task};
use tracing::{debug, info, warn};

/// 한 번의 작업 실행 동안 모든 가격 Task가 공유하는 협력 객체.
pub struct PriceSyncContext {
    pub policy: Arc<SyncPolicy>,
    pub collector: Arc<dyn Collector>,
    pub repository: Arc<dyn Repository>,
    /// 실행 시작 시 한 번 계산된 거래일 판정
    pub today: TradingDayCheck,
}

/// 종목 하나의 가격 동기화 Task를 만듭니다.
pub fn price_sync_task(
    ctx: Arc<PriceSyncContext>,
    entity_id: &str,
    granularity: Granularity,
) -> Task {
    let id = format!("{}:{}", granularity, entity_id);
    let description = format!("{} {} 동기화", entity_id, granularity);
    let entity_id = entity_id.to_string();

    Task::new(id, description, move |token| {
        let ctx = ctx.clone();
        let entity_id = entity_id.clone();
        async move { sync_entity(&ctx, &entity_id, granularity, &token).await }
    })
}

/// 종목 하나를 동기화합니다.
pub async fn sync_entity(
    ctx: &PriceSyncContext,
    entity_id: &str,
    granularity: Granularity,
    token: &CancellationToken,
) -> SyncResult<()> {
    let window = ctx
        .policy
        .compute_window(ctx.repository.as_ref(), entity_id, granularity, &ctx.today)
        .await?;

    let rows: Vec<PriceBar> = match window.mode {
        SyncMode::Skip => {
            debug!(entity = entity_id, %granularity, "이미 최신, 건너뜀");
            return Ok(());
        }
        SyncMode::RangeFetch => ctx.collector.fetch(entity_id, &window).await?,
        SyncMode::RefreshCurrentPeriod { stale_key } => {
            ctx.repository
                .delete(entity_id, stale_key, granularity)
                .await?;
            ctx.collector
                .fetch_current_period(entity_id, granularity, ctx.today.date)
                .await?
                .into_iter()
                .collect()
        }
    };

    if token.is_cancelled() {
        return Err(SyncError::Cancelled);
    }

    let written = if rows.is_empty() {
        0
    } else {
        ctx.repository.upsert_batch(&rows).await?
    };

    debug!(
        entity = entity_id,
        %granularity,
        mode = %window.mode,
        fetched = rows.len(),
        written,
        "동기화 완료"
    );

    if granularity == Granularity::Daily {
        flag_if_stale(ctx, entity_id, &rows).await;
    }

    Ok(())
}

/// 최신 일봉이 비활성 기준보다 오래되었으면 종목을 비활성으로 표시합니다.
///
/// 판정이나 표시에 실패해도 Task는 성공으로 남습니다.
async fn flag_if_stale(ctx: &PriceSyncContext, entity_id: &str, rows: &[PriceBar]) {
    let newest = match rows.iter().map(|r| r.period_date).max() {
        Some(date) => Some(date),
        None => match newest_persisted(ctx, entity_id).await {
            Ok(date) => date,
            Err(e) => {
                warn!(entity = entity_id, error = %e, "비활성 판정용 최신 레코드 조회 실패");
                return;
            }
        },
    };

    let Some(newest) = newest else {
        return;
    };

    if ctx.policy.is_stale(newest, ctx.today.date) {
        info!(
            entity = entity_id,
            newest = %newest,
            today = %ctx.today.date,
            "최신 일봉이 오래됨, 비활성 처리"
        );
        if let Err(e) = ctx.repository.update_status(entity_id, false).await {
            warn!(entity = entity_id, error = %e, "비활성 표시 실패");
        }
    }
}

async fn newest_persisted(ctx: &PriceSyncContext, entity_id: &str) -> SyncResult<Option<NaiveDate>> {
    ctx.repository
        .get_latest(entity_id, Granularity::Daily)
        .await?
        .map(|record| parse_period_date(&record.last_period_date))
        .transpose()
}
