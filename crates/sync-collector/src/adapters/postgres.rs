//! PostgreSQL 저장소.
//!
//! 가격 테이블은 단위별로 나뉘며 `(ts_code, trade_date)`가 기본 키입니다.
//! 모든 쓰기는 `INSERT ... ON CONFLICT DO UPDATE`로 처리되어 반복 실행해도 안전합니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use sync_core::{
    format_period_key, Entity, Granularity, HolderCount, LatestRecord, PerformanceReport,
    PriceBar, Repository, SyncError, SyncResult,
};
use tracing::{debug, info};

/// 한 번의 INSERT에 넣는 최대 행 수.
const UPSERT_CHUNK_SIZE: usize = 500;

/// 테이블 생성 DDL.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stock_basic (
    ts_code     VARCHAR(16) PRIMARY KEY,
    name        VARCHAR(64) NOT NULL DEFAULT '',
    is_active   BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS stock_price_daily (
    ts_code     VARCHAR(16) NOT NULL,
    trade_date  VARCHAR(8)  NOT NULL,
    open        NUMERIC(20, 4) NOT NULL,
    high        NUMERIC(20, 4) NOT NULL,
    low         NUMERIC(20, 4) NOT NULL,
    close       NUMERIC(20, 4) NOT NULL,
    pre_close   NUMERIC(20, 4) NOT NULL DEFAULT 0,
    vol         NUMERIC(24, 4) NOT NULL DEFAULT 0,
    amount      NUMERIC(24, 4) NOT NULL DEFAULT 0,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (ts_code, trade_date)
);

CREATE TABLE IF NOT EXISTS stock_price_weekly  (LIKE stock_price_daily INCLUDING ALL);
CREATE TABLE IF NOT EXISTS stock_price_monthly (LIKE stock_price_daily INCLUDING ALL);
CREATE TABLE IF NOT EXISTS stock_price_yearly  (LIKE stock_price_daily INCLUDING ALL);

CREATE TABLE IF NOT EXISTS stock_holder_number (
    ts_code     VARCHAR(16) NOT NULL,
    end_date    VARCHAR(8)  NOT NULL,
    holder_num  BIGINT NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (ts_code, end_date)
);

CREATE TABLE IF NOT EXISTS stock_performance_report (
    ts_code     VARCHAR(16) NOT NULL,
    end_date    VARCHAR(8)  NOT NULL,
    ann_date    VARCHAR(8),
    revenue     NUMERIC(24, 4),
    net_profit  NUMERIC(24, 4),
    eps         NUMERIC(12, 4),
    roe         NUMERIC(12, 4),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (ts_code, end_date)
);
"#;

/// 단위별 가격 테이블 이름.
pub fn price_table(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Daily => "stock_price_daily",
        Granularity::Weekly => "stock_price_weekly",
        Granularity::Monthly => "stock_price_monthly",
        Granularity::Yearly => "stock_price_yearly",
    }
}

fn repo_err(context: &str, err: sqlx::Error) -> SyncError {
    SyncError::Repository(format!("{}: {}", context, err))
}

/// `$1, $2, ...` 자리표시자 묶음을 만듭니다. 행마다 `columns`개의 값 + `NOW()`.
fn values_clause(rows: usize, columns: usize) -> String {
    (0..rows)
        .map(|i| {
            let base = i * columns;
            let params: Vec<String> = (1..=columns).map(|c| format!("${}", base + c)).collect();
            format!("({}, NOW())", params.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// PostgreSQL 저장소.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 커넥션 풀을 만들어 연결합니다.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 테이블이 없으면 생성합니다.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        info!("스키마 확인 완료");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn upsert_bar_chunk(&self, table: &str, chunk: &[PriceBar]) -> SyncResult<usize> {
        let query = format!(
            r#"INSERT INTO {table}
               (ts_code, trade_date, open, high, low, close, pre_close, vol, amount, updated_at)
               VALUES {values}
               ON CONFLICT (ts_code, trade_date) DO UPDATE SET
                   open = EXCLUDED.open,
                   high = EXCLUDED.high,
                   low = EXCLUDED.low,
                   close = EXCLUDED.close,
                   pre_close = EXCLUDED.pre_close,
                   vol = EXCLUDED.vol,
                   amount = EXCLUDED.amount,
                   updated_at = NOW()"#,
            table = table,
            values = values_clause(chunk.len(), 9),
        );

        let mut sql_query = sqlx::query(&query);
        for bar in chunk {
            sql_query = sql_query
                .bind(&bar.entity_id)
                .bind(format_period_key(bar.period_date))
                .bind(bar.open)
                .bind(bar.high)
                .bind(bar.low)
                .bind(bar.close)
                .bind(bar.pre_close)
                .bind(bar.volume)
                .bind(bar.amount);
        }

        let result = sql_query
            .execute(&self.pool)
            .await
            .map_err(|e| repo_err(table, e))?;
        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn list_entities(&self) -> SyncResult<Vec<Entity>> {
        let rows: Vec<(String, String, bool)> =
            sqlx::query_as("SELECT ts_code, name, is_active FROM stock_basic ORDER BY ts_code")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| repo_err("stock_basic 조회", e))?;

        Ok(rows
            .into_iter()
            .map(|(id, name, active)| Entity { id, name, active })
            .collect())
    }

    async fn get_latest(
        &self,
        entity_id: &str,
        granularity: Granularity,
    ) -> SyncResult<Option<LatestRecord>> {
        let query = format!(
            "SELECT trade_date, updated_at FROM {} WHERE ts_code = $1 ORDER BY trade_date DESC LIMIT 1",
            price_table(granularity)
        );
        let row: Option<(String, Option<DateTime<Utc>>)> = sqlx::query_as(&query)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| repo_err("최신 레코드 조회", e))?;

        Ok(row.map(|(last_period_date, updated_at)| LatestRecord {
            entity_id: entity_id.to_string(),
            granularity,
            last_period_date,
            updated_at,
        }))
    }

    async fn delete(
        &self,
        entity_id: &str,
        period_date: NaiveDate,
        granularity: Granularity,
    ) -> SyncResult<()> {
        // 과거에 대시 형식으로 저장된 키도 함께 지움
        let query = format!(
            "DELETE FROM {} WHERE ts_code = $1 AND trade_date IN ($2, $3)",
            price_table(granularity)
        );
        let result = sqlx::query(&query)
            .bind(entity_id)
            .bind(format_period_key(period_date))
            .bind(period_date.format("%Y-%m-%d").to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| repo_err("기간 레코드 삭제", e))?;

        debug!(
            entity = entity_id,
            %granularity,
            period = %period_date,
            deleted = result.rows_affected(),
            "진행 중 기간 레코드 삭제"
        );
        Ok(())
    }

    async fn upsert_batch(&self, rows: &[PriceBar]) -> SyncResult<usize> {
        let mut total = 0;
        for granularity in Granularity::all() {
            let bars: Vec<PriceBar> = rows
                .iter()
                .filter(|b| b.granularity == granularity)
                .cloned()
                .collect();
            for chunk in bars.chunks(UPSERT_CHUNK_SIZE) {
                total += self.upsert_bar_chunk(price_table(granularity), chunk).await?;
            }
        }
        Ok(total)
    }

    async fn update_status(&self, entity_id: &str, active: bool) -> SyncResult<()> {
        sqlx::query("UPDATE stock_basic SET is_active = $2 WHERE ts_code = $1")
            .bind(entity_id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(|e| repo_err("종목 상태 변경", e))?;
        Ok(())
    }

    async fn upsert_holder_counts(&self, rows: &[HolderCount]) -> SyncResult<usize> {
        let mut total = 0;
        for chunk in rows.chunks(UPSERT_CHUNK_SIZE) {
            let query = format!(
                r#"INSERT INTO stock_holder_number (ts_code, end_date, holder_num, updated_at)
                   VALUES {}
                   ON CONFLICT (ts_code, end_date) DO UPDATE SET
                       holder_num = EXCLUDED.holder_num,
                       updated_at = NOW()"#,
                values_clause(chunk.len(), 3)
            );
            let mut sql_query = sqlx::query(&query);
            for row in chunk {
                sql_query = sql_query
                    .bind(&row.entity_id)
                    .bind(format_period_key(row.end_date))
                    .bind(row.holder_num);
            }
            let result = sql_query
                .execute(&self.pool)
                .await
                .map_err(|e| repo_err("stock_holder_number", e))?;
            total += result.rows_affected() as usize;
        }
        Ok(total)
    }

    async fn upsert_performance_reports(&self, rows: &[PerformanceReport]) -> SyncResult<usize> {
        let mut total = 0;
        for chunk in rows.chunks(UPSERT_CHUNK_SIZE) {
            let query = format!(
                r#"INSERT INTO stock_performance_report
                   (ts_code, end_date, ann_date, revenue, net_profit, eps, roe, updated_at)
                   VALUES {}
                   ON CONFLICT (ts_code, end_date) DO UPDATE SET
                       ann_date = EXCLUDED.ann_date,
                       revenue = EXCLUDED.revenue,
                       net_profit = EXCLUDED.net_profit,
                       eps = EXCLUDED.eps,
                       roe = EXCLUDED.roe,
                       updated_at = NOW()"#,
                values_clause(chunk.len(), 7)
            );
            let mut sql_query = sqlx::query(&query);
            for row in chunk {
                sql_query = sql_query
                    .bind(&row.entity_id)
                    .bind(format_period_key(row.end_date))
                    .bind(row.ann_date.map(format_period_key))
                    .bind(row.revenue)
                    .bind(row.net_profit)
                    .bind(row.eps)
                    .bind(row.roe);
            }
            let result = sql_query
                .execute(&self.pool)
                .await
                .map_err(|e| repo_err("stock_performance_report", e))?;
            total += result.rows_affected() as usize;
        }
        Ok(total)
    }
}
