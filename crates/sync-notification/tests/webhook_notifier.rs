//! Webhook / 다중 전송기 테스트.

use async_trait::async_trait;
use mockito::Matcher;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use sync_notification::{
    LogNotifier, NotificationError, NotificationManager, NotificationResult, Notifier,
    WebhookConfig, WebhookNotifier,
};

#[tokio::test]
async fn test_webhook_posts_text_payload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(serde_json::json!({
            "msgtype": "text",
            "text": { "content": "[prod]\n[daily_price] 총 3건" },
        })))
        .with_status(200)
        .with_body(r#"{"errcode":0,"errmsg":"ok"}"#)
        .create_async()
        .await;

    let config = WebhookConfig::new(format!("{}/hook", server.url())).with_title("prod");
    let notifier = WebhookNotifier::new(config).unwrap();
    notifier.notify("[daily_price] 총 3건").await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_webhook_nonzero_errcode_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/hook")
        .with_status(200)
        .with_body(r#"{"errcode":93000,"errmsg":"invalid webhook url"}"#)
        .create_async()
        .await;

    let notifier = WebhookNotifier::new(WebhookConfig::new(format!("{}/hook", server.url()))).unwrap();
    let err = notifier.notify("hello").await.unwrap_err();

    assert!(matches!(err, NotificationError::Rejected { code: 93000, .. }));
}

#[tokio::test]
async fn test_webhook_http_errors() {
    let mut server = mockito::Server::new_async().await;
    let _limited = server
        .mock("POST", "/limited")
        .with_status(429)
        .with_header("retry-after", "15")
        .create_async()
        .await;
    let _broken = server
        .mock("POST", "/broken")
        .with_status(500)
        .with_body("upstream down")
        .create_async()
        .await;

    let limited = WebhookNotifier::new(WebhookConfig::new(format!("{}/limited", server.url()))).unwrap();
    let broken = WebhookNotifier::new(WebhookConfig::new(format!("{}/broken", server.url()))).unwrap();

    assert!(matches!(
        limited.notify("x").await.unwrap_err(),
        NotificationError::RateLimited(15)
    ));
    match broken.notify("x").await.unwrap_err() {
        NotificationError::SendFailed(msg) => assert!(msg.contains("upstream down")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_invalid_url_is_config_error() {
    let result = WebhookNotifier::new(WebhookConfig::new("ftp://example"));
    assert!(matches!(result, Err(NotificationError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_disabled_webhook_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", "/hook").expect(0).create_async().await;

    let mut config = WebhookConfig::new(format!("{}/hook", server.url()));
    config.enabled = false;
    let notifier = WebhookNotifier::new(config).unwrap();
    notifier.notify("x").await.unwrap();

    mock.assert_async().await;
}

struct FailingNotifier {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _summary: &str) -> NotificationResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NotificationError::SendFailed("down".into()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[tokio::test]
async fn test_manager_tolerates_partial_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let manager = NotificationManager::new()
        .with(LogNotifier)
        .with(FailingNotifier { calls: calls.clone() });

    assert_eq!(manager.len(), 2);
    assert!(manager.notify("summary").await.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_manager_with_single_notifier_propagates_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let manager = NotificationManager::new().with(FailingNotifier { calls });
    assert!(manager.notify("summary").await.is_err());
}
