//! 스냅샷 데이터셋 작업 (주주 수, 실적 속보).
//!
//! 증분 윈도우 없이 공급자가 주는 전체 목록을 upsert 합니다.
//! 키가 (종목, 기준일)이므로 반복 실행해도 결과는 같습니다.

use std::sync::Arc;
use sync_core::{Collector, Repository, SyncError, SyncResult};
use sync_executor::{CancellationToken, Task};
use tracing::debug;

pub struct SnapshotContext {
    pub collector: Arc<dyn Collector>,
    pub repository: Arc<dyn Repository>,
}

pub fn holder_count_task(ctx: Arc<SnapshotContext>, entity_id: &str) -> Task {
    let entity_id = entity_id.to_string();
    Task::new(
        format!("holder_count:{}", entity_id),
        format!("{} 주주 수 동기화", entity_id),
        move |token| {
            let ctx = ctx.clone();
            let entity_id = entity_id.clone();
            async move { sync_holder_counts(&ctx, &entity_id, &token).await }
        },
    )
}

pub fn performance_report_task(ctx: Arc<SnapshotContext>, entity_id: &str) -> Task {
    let entity_id = entity_id.to_string();
    Task::new(
        format!("performance_report:{}", entity_id),
        format!("{} 실적 속보 동기화", entity_id),
        move |token| {
            let ctx = ctx.clone();
            let entity_id = entity_id.clone();
            async move { sync_performance_reports(&ctx, &entity_id, &token).await }
        },
    )
}

async fn sync_holder_counts(
    ctx: &SnapshotContext,
    entity_id: &str,
    token: &CancellationToken,
) -> SyncResult<()> {
    let rows = ctx.collector.fetch_holder_counts(entity_id).await?;
    if token.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    if rows.is_empty() {
        return Ok(());
    }
    let written = ctx.repository.upsert_holder_counts(&rows).await?;
    debug!(entity = entity_id, fetched = rows.len(), written, "주주 수 저장");
    Ok(())
}

async fn sync_performance_reports(
    ctx: &SnapshotContext,
    entity_id: &str,
    token: &CancellationToken,
) -> SyncResult<()> {
    let rows = ctx.collector.fetch_performance_reports(entity_id).await?;
    if token.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    if rows.is_empty() {
        return Ok(());
    }
    let written = ctx.repository.upsert_performance_reports(&rows).await?;
    debug!(entity = entity_id, fetched = rows.len(), written, "실적 속보 저장");
    Ok(())
}
