//! Pushover notification client

use std::sync::Arc;

use async_trait::async_trait;

use crate::io::HttpClient;
use crate::notifier::{Notification, Notifier};

const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Pushover caps message bodies at 1024 characters
const PUSHOVER_MAX_MESSAGE_CHARS: usize = 1024;

/// Pushover notification sender
pub struct PushoverNotifier {
    api_token: String,
    user_key: String,
    default_title: String,
    default_priority: i8,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for PushoverNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverNotifier")
            .field("default_title", &self.default_title)
            .finish()
    }
}

impl PushoverNotifier {
    pub fn new(
        api_token: &str,
        user_key: &str,
        default_title: &str,
        default_priority: i8,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        tracing::debug!("Created PushoverNotifier with title '{}'", default_title);

        Self {
            api_token: api_token.to_string(),
            user_key: user_key.to_string(),
            default_title: default_title.to_string(),
            default_priority,
            http,
        }
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    fn type_name(&self) -> &str {
        "pushover"
    }

    async fn notify(&self, notification: &Notification) -> crate::Result<()> {
        let title = if notification.title.is_empty() {
            &self.default_title
        } else {
            &notification.title
        };
        let priority = if notification.priority != 0 {
            notification.priority
        } else {
            self.default_priority
        };
        let message: String = notification
            .message
            .chars()
            .take(PUSHOVER_MAX_MESSAGE_CHARS)
            .collect();

        let priority_str = priority.to_string();
        let params = vec![
            ("token", self.api_token.as_str()),
            ("user", self.user_key.as_str()),
            ("title", title),
            ("message", message.as_str()),
            ("priority", &priority_str),
        ];

        tracing::debug!(
            "Sending Pushover notification: title='{}', priority={}",
            title,
            priority
        );

        let response = self.http.post_form(PUSHOVER_API_URL, &params).await?;

        if response.status != 200 {
            return Err(crate::LogwatchError::NotificationFailed(format!(
                "Pushover API returned status {}: {}",
                response.status, response.body
            )));
        }

        tracing::debug!("Pushover notification sent successfully");
        Ok(())
    }
}
