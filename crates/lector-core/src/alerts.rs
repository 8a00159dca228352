//! Fire-and-forget failure alerts.

use serde_json::json;

use crate::providers::shared::USER_AGENT;

/// Receives operational alerts. Implementations must not block and must not
/// fail the caller.
pub trait Alerter: Send + Sync {
    fn alert(&self, subject: &str, message: &str);
}

/// Logs alerts at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn alert(&self, subject: &str, message: &str) {
        tracing::warn!(subject, "{message}");
    }
}

/// Logs alerts and POSTs them as JSON to a webhook.
///
/// Delivery runs on the current Tokio runtime; without one, or when the
/// request fails, the alert is only logged.
pub struct WebhookAlerter {
    url: String,
    http: reqwest::Client,
}

impl WebhookAlerter {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }
}

impl Alerter for WebhookAlerter {
    fn alert(&self, subject: &str, message: &str) {
        LogAlerter.alert(subject, message);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime for webhook alert delivery");
            return;
        };

        let request = self
            .http
            .post(&self.url)
            .header("user-agent", USER_AGENT)
            .json(&json!({ "subject": subject, "message": message }));
        handle.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::debug!(status = %response.status(), "Webhook alert rejected");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Webhook alert failed: {e}"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_webhook_alerter_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(json!({ "subject": "tts", "message": "key 1 failed" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let alerter = WebhookAlerter::new(format!("{}/hook", server.uri()));
        alerter.alert("tts", "key 1 failed");

        for _ in 0..50 {
            if !server.received_requests().await.unwrap_or_default().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        server.verify().await;
    }

    #[test]
    fn test_webhook_alerter_without_runtime_does_not_panic() {
        let alerter = WebhookAlerter::new("http://127.0.0.1:9/hook");
        alerter.alert("subject", "message");
    }
}
