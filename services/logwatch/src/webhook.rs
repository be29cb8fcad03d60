//! Generic JSON webhook notifier

use std::sync::Arc;

use async_trait::async_trait;

use crate::io::HttpClient;
use crate::notifier::{format_timestamp, Notification, Notifier};

/// POSTs each alert as a JSON document
pub struct WebhookNotifier {
    url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &self.url)
            .finish()
    }
}

impl WebhookNotifier {
    pub fn new(url: &str, http: Arc<dyn HttpClient>) -> Self {
        Self {
            url: url.to_string(),
            http,
        }
    }

    fn body(notification: &Notification) -> serde_json::Value {
        let alert = &notification.alert;
        serde_json::json!({
            "title": notification.title,
            "message": notification.message,
            "count": alert.count,
            "timestamp": alert.timestamp,
            "time": format_timestamp(alert.timestamp),
            "source_path": alert.source_path,
            "sample_lines": alert.sample_lines,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn type_name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, notification: &Notification) -> crate::Result<()> {
        let response = self
            .http
            .post_json(&self.url, &Self::body(notification))
            .await?;

        if !(200..300).contains(&response.status) {
            return Err(crate::LogwatchError::NotificationFailed(format!(
                "Webhook {} returned status {}: {}",
                self.url, response.status, response.body
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::AlertPayload;
    use crate::io::{HttpResponse, MockHttpClient};
    use std::path::PathBuf;

    fn notification() -> Notification {
        Notification::from_alert(
            &AlertPayload {
                count: 2,
                sample_lines: vec!["ERROR a".to_string(), "ERROR b".to_string()],
                timestamp: 60,
                source_path: PathBuf::from("/var/log/app.log"),
            },
            10,
        )
    }

    #[tokio::test]
    async fn posts_alert_fields() {
        let mut mock = MockHttpClient::new();
        mock.expect_post_json()
            .withf(|url, body| {
                url == "http://hooks.local/alert"
                    && body["count"] == 2
                    && body["timestamp"] == 60
                    && body["time"] == "1970-01-01T00:01:00+00:00"
                    && body["source_path"] == "/var/log/app.log"
                    && body["sample_lines"][1] == "ERROR b"
            })
            .times(1)
            .returning(|_, _| {
                Box::pin(async {
                    Ok(HttpResponse {
                        status: 204,
                        body: String::new(),
                    })
                })
            });

        WebhookNotifier::new("http://hooks.local/alert", Arc::new(mock))
            .notify(&notification())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sample_lines_follow_configured_cap() {
        let notification = Notification::from_alert(
            &AlertPayload {
                count: 500,
                sample_lines: (0..500).map(|i| format!("ERROR {i}")).collect(),
                timestamp: 60,
                source_path: PathBuf::from("/var/log/app.log"),
            },
            3,
        );

        let mut mock = MockHttpClient::new();
        mock.expect_post_json()
            .withf(|_, body| {
                body["count"] == 500
                    && body["sample_lines"].as_array().map(Vec::len) == Some(3)
                    && body["sample_lines"][2] == "ERROR 2"
            })
            .times(1)
            .returning(|_, _| {
                Box::pin(async {
                    Ok(HttpResponse {
                        status: 200,
                        body: String::new(),
                    })
                })
            });

        WebhookNotifier::new("http://hooks.local/alert", Arc::new(mock))
            .notify(&notification)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_2xx_is_notification_failure() {
        let mut mock = MockHttpClient::new();
        mock.expect_post_json().returning(|_, _| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 500,
                    body: "boom".to_string(),
                })
            })
        });

        let err = WebhookNotifier::new("http://hooks.local/alert", Arc::new(mock))
            .notify(&notification())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::LogwatchError::NotificationFailed(_)));
        assert!(err.to_string().contains("500"));
    }
}
