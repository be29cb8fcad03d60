//! Notifier trait and rendering of alerts into notifications

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::detector::AlertPayload;
use crate::event::{ErrorEvent, EventSummary};

/// A notification to be sent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: i8,
    /// The alert this notification was rendered from, with `sample_lines`
    /// cut to the configured maximum
    pub alert: AlertPayload,
}

impl Notification {
    /// Render an alert, quoting at most `max_sample_lines` raw lines
    pub fn from_alert(alert: &AlertPayload, max_sample_lines: usize) -> Self {
        let events: Vec<ErrorEvent> = alert
            .sample_lines
            .iter()
            .map(|line| ErrorEvent::parse(line))
            .collect();
        let summary = EventSummary::from_events(&events);

        let mut message = format!(
            "{} error lines in {} at {}",
            alert.count,
            alert.source_path.display(),
            format_timestamp(alert.timestamp)
        );

        if !summary.by_status.is_empty() {
            let statuses: Vec<String> = summary
                .by_status
                .iter()
                .map(|(status, n)| format!("{status} x{n}"))
                .collect();
            message.push_str(&format!("\nStatus codes: {}", statuses.join(", ")));
        }
        if !summary.by_client.is_empty() {
            let clients: Vec<String> = EventSummary::top(&summary.by_client, 3)
                .into_iter()
                .map(|(client, n)| format!("{client} x{n}"))
                .collect();
            message.push_str(&format!("\nTop clients: {}", clients.join(", ")));
        }
        if !summary.by_path.is_empty() {
            let paths: Vec<String> = EventSummary::top(&summary.by_path, 3)
                .into_iter()
                .map(|(path, n)| format!("{path} x{n}"))
                .collect();
            message.push_str(&format!("\nTop paths: {}", paths.join(", ")));
        }

        if max_sample_lines > 0 && !alert.sample_lines.is_empty() {
            message.push_str("\n\nSample lines:");
            for line in alert.sample_lines.iter().take(max_sample_lines) {
                message.push('\n');
                message.push_str(line);
            }
            let hidden = alert.sample_lines.len().saturating_sub(max_sample_lines);
            if hidden > 0 {
                message.push_str(&format!("\n... and {hidden} more"));
            }
        }

        let mut alert = alert.clone();
        alert.sample_lines.truncate(max_sample_lines);

        Self {
            title: format!(
                "Error burst: {} ({} lines)",
                alert.source_path.display(),
                alert.count
            ),
            message,
            priority: 0,
            alert,
        }
    }
}

/// RFC 3339 rendering of epoch seconds, falling back to the raw number
pub fn format_timestamp(epoch_secs: u64) -> String {
    i64::try_from(epoch_secs)
        .ok()
        .and_then(|secs| chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| epoch_secs.to_string())
}

/// Trait for sending notifications
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Get the notifier type name (e.g. "pushover")
    fn type_name(&self) -> &str;

    /// Send a notification
    async fn notify(&self, notification: &Notification) -> crate::Result<()>;
}

/// Writes alerts to the tracing log sink
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn type_name(&self) -> &str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> crate::Result<()> {
        tracing::warn!("{}\n{}", notification.title, notification.message);
        Ok(())
    }
}
