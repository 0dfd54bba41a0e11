//! 배치 실행 통계.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::task::TaskResult;

/// 배치 실행 통계.
///
/// `total_tasks == success_tasks + failed_tasks` 이며,
/// `timed_out_tasks`와 `cancelled_tasks`는 `failed_tasks`의 부분 집합입니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionStats {
    /// 총 작업 수
    pub total_tasks: usize,
    /// 성공 작업 수
    pub success_tasks: usize,
    /// 실패 작업 수 (타임아웃, 취소 포함)
    pub failed_tasks: usize,
    /// 타임아웃으로 실패한 작업 수
    pub timed_out_tasks: usize,
    /// 취소된 작업 수
    pub cancelled_tasks: usize,
    /// 작업 소요 시간 합계
    pub total_duration: Duration,
    pub average_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ExecutionStats {
    /// 작업이 없는 배치의 통계.
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            total_tasks: 0,
            success_tasks: 0,
            failed_tasks: 0,
            timed_out_tasks: 0,
            cancelled_tasks: 0,
            total_duration: Duration::ZERO,
            average_duration: Duration::ZERO,
            min_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
            start_time: at,
            end_time: at,
        }
    }

    /// 결과 목록으로부터 통계를 계산합니다.
    pub fn from_results(
        results: &[TaskResult],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let mut stats = Self::empty(start_time);
        stats.end_time = end_time;

        if results.is_empty() {
            return stats;
        }

        let mut min = Duration::MAX;
        for result in results {
            stats.total_tasks += 1;
            if result.success {
                stats.success_tasks += 1;
            } else {
                stats.failed_tasks += 1;
                if result.is_timeout() {
                    stats.timed_out_tasks += 1;
                } else if result.is_cancelled() {
                    stats.cancelled_tasks += 1;
                }
            }
            stats.total_duration += result.duration;
            min = min.min(result.duration);
            stats.max_duration = stats.max_duration.max(result.duration);
        }

        stats.min_duration = min;
        stats.average_duration = stats.total_duration / stats.total_tasks as u32;
        stats
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            (self.success_tasks as f64 / self.total_tasks as f64) * 100.0
        }
    }

    /// 배치 경과 시간 (벽시계 기준).
    pub fn elapsed(&self) -> Duration {
        (self.end_time - self.start_time)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// 알림용 한 줄 요약.
    pub fn summary_line(&self, operation: &str) -> String {
        format!(
            "[{}] 총 {}건 / 성공 {} / 실패 {} (타임아웃 {}, 취소 {}) / 성공률 {:.1}% / 소요 {:.1}s",
            operation,
            self.total_tasks,
            self.success_tasks,
            self.failed_tasks,
            self.timed_out_tasks,
            self.cancelled_tasks,
            self.success_rate(),
            self.elapsed().as_secs_f64(),
        )
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total_tasks,
            success = self.success_tasks,
            failed = self.failed_tasks,
            timed_out = self.timed_out_tasks,
            cancelled = self.cancelled_tasks,
            success_rate = format!("{:.1}%", self.success_rate()),
            avg = format!("{:.2}s", self.average_duration.as_secs_f64()),
            max = format!("{:.2}s", self.max_duration.as_secs_f64()),
            elapsed = format!("{:.1}s", self.elapsed().as_secs_f64()),
            "배치 실행 완료"
        );
    }
}
