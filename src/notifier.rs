//! Rate-limited diagnostic notifications
//!
//! Surfaces raw fetch payloads and errors to the operator through a
//! host-visible notification channel, at most once per cooldown window per
//! vehicle. When disabled via configuration the notifier never fires.

use crate::logging::get_logger;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Minimum seconds between notifications for the same vehicle
pub const NOTIFICATION_COOLDOWN_SECS: i64 = 600;

/// Upper bound on rendered payload size in a notification
const MAX_RENDERED_CHARS: usize = 1500;

/// Host notification channel
///
/// Implemented by whatever the hosting environment offers for operator
/// messages. Delivery is best-effort and must not fail the polling cycle.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, title: &str, message: &str, notification_id: &str);
}

/// Default sink that writes notifications to the log
pub struct LogNotificationSink {
    logger: crate::logging::StructuredLogger,
}

impl LogNotificationSink {
    pub fn new() -> Self {
        Self {
            logger: get_logger("notify"),
        }
    }
}

impl Default for LogNotificationSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send(&self, title: &str, message: &str, notification_id: &str) {
        self.logger
            .warn(&format!("[{}] {}: {}", notification_id, title, message));
    }
}

/// What a diagnostic notification carries
#[derive(Debug, Clone, Copy)]
pub enum DiagnosticPayload<'a> {
    /// Raw provider payload from a successful fetch
    Raw(&'a serde_json::Value),

    /// Failure description from an unsuccessful cycle
    Error(&'a str),
}

/// Cooldown-gated notifier, one state entry per vehicle
pub struct DiagnosticNotifier {
    enabled: bool,
    cooldown: ChronoDuration,
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
    sink: Arc<dyn NotificationSink>,
    logger: crate::logging::StructuredLogger,
}

impl DiagnosticNotifier {
    /// Create a notifier; `enabled` mirrors the debug_notifications setting
    pub fn new(enabled: bool, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            enabled,
            cooldown: ChronoDuration::seconds(NOTIFICATION_COOLDOWN_SECS),
            last_sent: Mutex::new(HashMap::new()),
            sink,
            logger: get_logger("notifier"),
        }
    }

    /// Emit a notification unless disabled or still inside the cooldown.
    /// Returns whether a notification was sent.
    pub async fn maybe_notify(&self, vehicle_id: &str, payload: DiagnosticPayload<'_>) -> bool {
        self.maybe_notify_at(vehicle_id, payload, Utc::now()).await
    }

    /// Cooldown check against an explicit `now`, for deterministic tests
    pub async fn maybe_notify_at(
        &self,
        vehicle_id: &str,
        payload: DiagnosticPayload<'_>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        {
            let mut last_sent = self.last_sent.lock().await;
            if let Some(prev) = last_sent.get(vehicle_id)
                && now - *prev < self.cooldown
            {
                self.logger.trace(&format!(
                    "Notification for {} suppressed, cooldown active",
                    vehicle_id
                ));
                return false;
            }
            last_sent.insert(vehicle_id.to_string(), now);
        }

        let (title, message) = match payload {
            DiagnosticPayload::Raw(value) => (
                format!("Voltlink diagnostics for {}", vehicle_id),
                render_value(value),
            ),
            DiagnosticPayload::Error(error) => (
                format!("Voltlink error for {}", vehicle_id),
                truncate(error.to_string()),
            ),
        };
        let notification_id = format!("voltlink_{}_diagnostics", vehicle_id);

        self.sink.send(&title, &message, &notification_id).await;
        true
    }
}

/// Best-effort rendering; malformed payloads never cause a panic
fn render_value(value: &serde_json::Value) -> String {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    truncate(rendered)
}

fn truncate(mut s: String) -> String {
    if s.chars().count() > MAX_RENDERED_CHARS {
        s = s.chars().take(MAX_RENDERED_CHARS).collect();
        s.push_str("\n… (truncated)");
    }
    s
}
