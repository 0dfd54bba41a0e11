//! 외부 협력자 추상화.
//!
//! 수집기(데이터 공급자 어댑터)와 저장소(관계형 DB)를 동기화 로직과 분리하기 위한
//! 인터페이스입니다. 구현체는 생성자로 주입되며 전역 레지스트리는 두지 않습니다.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{Entity, HolderCount, LatestRecord, PerformanceReport, PriceBar, SyncWindow};
use crate::error::SyncResult;
use crate::types::Granularity;

// =============================================================================
// Collector Trait
// =============================================================================

/// 데이터 공급자 어댑터.
///
/// 신뢰할 수 없는 네트워크 경계로 취급합니다. 모든 에러는 해당 작업만 실패시키며
/// 배치 전체에는 영향을 주지 않습니다.
///
/// # Errors
///
/// - `SyncError::Fetch`: 네트워크/공급자 오류 (재시도 가능)
/// - `SyncError::Parse`: 응답 형식 오류 (재시도 안 함)
#[async_trait]
pub trait Collector: Send + Sync {
    /// 윈도우 범위(`start_date..=end_date`)의 바를 조회합니다.
    async fn fetch(&self, entity_id: &str, window: &SyncWindow) -> SyncResult<Vec<PriceBar>>;

    /// `as_of`가 속한 진행 중 기간의 누계 스냅샷 하나를 조회합니다.
    ///
    /// 해당 기간에 거래가 없으면 `None`입니다.
    async fn fetch_current_period(
        &self,
        entity_id: &str,
        granularity: Granularity,
        as_of: NaiveDate,
    ) -> SyncResult<Option<PriceBar>>;

    /// 분기별 주주 수 조회.
    async fn fetch_holder_counts(&self, entity_id: &str) -> SyncResult<Vec<HolderCount>>;

    /// 실적 속보 조회.
    async fn fetch_performance_reports(
        &self,
        entity_id: &str,
    ) -> SyncResult<Vec<PerformanceReport>>;
}

// =============================================================================
// Repository Trait
// =============================================================================

/// 영속 계층.
///
/// upsert 키는 (종목, 기간 기준일)이며 같은 키의 반복 upsert는 멱등입니다.
/// 중복 방지는 프로세스 내 락이 아니라 이 멱등성에 의존합니다.
#[async_trait]
pub trait Repository: Send + Sync {
    /// 종목 전체 목록 (활성/비활성 포함).
    async fn list_entities(&self) -> SyncResult<Vec<Entity>>;

    /// (종목, 단위)의 최신 레코드. 없으면 `None`.
    async fn get_latest(
        &self,
        entity_id: &str,
        granularity: Granularity,
    ) -> SyncResult<Option<LatestRecord>>;

    /// 정확히 (종목, 기준일, 단위) 키의 레코드를 삭제합니다.
    async fn delete(
        &self,
        entity_id: &str,
        period_date: NaiveDate,
        granularity: Granularity,
    ) -> SyncResult<()>;

    /// 바 일괄 upsert. 반영된 행 수를 반환합니다.
    async fn upsert_batch(&self, rows: &[PriceBar]) -> SyncResult<usize>;

    /// 종목 활성 상태 변경.
    async fn update_status(&self, entity_id: &str, active: bool) -> SyncResult<()>;

    /// 주주 수 일괄 upsert.
    async fn upsert_holder_counts(&self, rows: &[HolderCount]) -> SyncResult<usize>;

    /// 실적 속보 일괄 upsert.
    async fn upsert_performance_reports(&self, rows: &[PerformanceReport]) -> SyncResult<usize>;
}
