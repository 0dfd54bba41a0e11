//! 로그 알림과 다중 전송기 관리.

use async_trait::async_trait;
use tracing::{error, info};

use crate::types::{NotificationResult, Notifier};

/// 요약을 로그로만 남기는 전송기. 다른 채널이 없을 때의 기본값.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, summary: &str) -> NotificationResult<()> {
        info!(summary, "작업 요약");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// 여러 전송기로 같은 요약을 보냅니다.
///
/// 활성 전송기가 하나뿐일 때만 그 에러를 반환하고,
/// 여럿이면 일부 실패는 로그로 남기고 성공으로 처리합니다.
#[derive(Default)]
pub struct NotificationManager {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<N: Notifier + 'static>(&mut self, notifier: N) {
        self.notifiers.push(Box::new(notifier));
    }

    pub fn with<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.add(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl Notifier for NotificationManager {
    async fn notify(&self, summary: &str) -> NotificationResult<()> {
        let active: Vec<_> = self.notifiers.iter().filter(|n| n.is_enabled()).collect();
        let mut last_error = None;

        for notifier in &active {
            if let Err(e) = notifier.notify(summary).await {
                error!(notifier = notifier.name(), error = %e, "알림 전송 실패");
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) if active.len() == 1 => Err(e),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "manager"
    }
}
