//! Webhook 알림.
//!
//! 기업 메신저 그룹 봇 형식으로 전송합니다:
//!
//! ```json
//! {"msgtype": "text", "text": {"content": "..."}}
//! ```
//!
//! 응답 본문에 `errcode`가 있으면 0일 때만 성공으로 봅니다.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::{NotificationError, NotificationResult, Notifier};

/// Webhook 설정.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub enabled: bool,
    pub timeout: Duration,
    /// 메시지 앞에 붙는 머리말 (예: 환경 이름)
    pub title: Option<String>,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            enabled: true,
            timeout: Duration::from_secs(10),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// 환경 변수에서 설정을 생성합니다. `NOTIFY_WEBHOOK_URL`이 없으면 `None`.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("NOTIFY_WEBHOOK_URL").ok()?;
        if url.trim().is_empty() {
            return None;
        }
        let enabled = std::env::var("NOTIFY_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);
        let title = std::env::var("NOTIFY_TITLE").ok().filter(|t| !t.is_empty());

        Some(Self {
            url,
            enabled,
            timeout: Duration::from_secs(10),
            title,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WebhookReply {
    errcode: Option<i64>,
    errmsg: Option<String>,
}

/// Webhook 알림 전송기.
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> NotificationResult<Self> {
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(NotificationError::InvalidConfig(format!(
                "webhook URL 형식 오류: {}",
                config.url
            )));
        }
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Option<NotificationResult<Self>> {
        WebhookConfig::from_env().map(Self::new)
    }

    fn format_message(&self, summary: &str) -> String {
        match &self.config.title {
            Some(title) => format!("[{title}]\n{summary}"),
            None => summary.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, summary: &str) -> NotificationResult<()> {
        if !self.is_enabled() {
            debug!("webhook 알림 비활성화, 건너뜀");
            return Ok(());
        }

        let payload = serde_json::json!({
            "msgtype": "text",
            "text": { "content": self.format_message(summary) },
        });

        let response = self.client.post(&self.config.url).json(&payload).send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            warn!(retry_after, "webhook 요청 한도 초과");
            return Err(NotificationError::RateLimited(retry_after));
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(NotificationError::SendFailed(format!("HTTP {status}: {body}")));
        }

        // 빈 본문이나 JSON이 아닌 본문은 성공으로 취급
        if let Ok(reply) = serde_json::from_str::<WebhookReply>(&body) {
            if let Some(code) = reply.errcode.filter(|c| *c != 0) {
                return Err(NotificationError::Rejected {
                    code,
                    message: reply.errmsg.unwrap_or_default(),
                });
            }
        }

        info!("webhook 알림 전송 완료");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.url.is_empty()
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
