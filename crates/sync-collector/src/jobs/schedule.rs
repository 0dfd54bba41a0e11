//! 작업 스케줄 표.

use super::JobKind;
use crate::error::{CollectorError, Result};

/// (작업, cron 식, 설명) 한 줄.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub job: JobKind,
    /// 6 또는 7 필드 cron 식 (초 포함, UTC)
    pub cron: String,
    pub description: String,
}

impl ScheduleEntry {
    pub fn new(job: JobKind, cron: impl Into<String>) -> Result<Self> {
        let cron = cron.into();
        validate_cron(&cron)?;
        Ok(Self {
            job,
            cron,
            description: job.description().to_string(),
        })
    }
}

/// 시작 시 한 번 로드되는 스케줄 표.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleTable {
    entries: Vec<ScheduleEntry>,
}

impl ScheduleTable {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        Self { entries }
    }

    /// 모든 작업의 기본 스케줄.
    pub fn defaults() -> Result<Self> {
        JobKind::all()
            .into_iter()
            .map(|job| ScheduleEntry::new(job, job.default_schedule()))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn jobs(&self) -> impl Iterator<Item = JobKind> + '_ {
        self.entries.iter().map(|e| e.job)
    }

    pub fn get(&self, job: JobKind) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.job == job)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 필드 수와 허용 문자만 검사합니다. 의미 검사는 스케줄러 등록 시 수행됩니다.
fn validate_cron(expr: &str) -> Result<()> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if !(6..=7).contains(&fields.len()) {
        return Err(CollectorError::Config(format!(
            "cron 식은 6~7개 필드여야 합니다 (초 분 시 일 월 요일 [연]): '{}'",
            expr
        )));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || "*/,-?#LW".contains(c);
    if let Some(bad) = fields.iter().find(|f| !f.chars().all(allowed)) {
        return Err(CollectorError::Config(format!(
            "cron 필드에 허용되지 않는 문자: '{}' ({})",
            bad, expr
        )));
    }
    Ok(())
}
