//! Notifier that writes user-facing messages to tracing output.

use tracing::{error, info, warn};
use tramite_application::{Notification, NotificationSeverity, Notifier};

/// Notifier for headless runs. Logs each notification at a matching level.
#[derive(Clone)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// Creates a new tracing notifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let life_ms = notification.life.as_millis();
        match notification.severity {
            NotificationSeverity::Error => error!(
                summary = notification.summary.as_str(),
                life_ms = life_ms,
                "{}",
                notification.detail
            ),
            NotificationSeverity::Warn => warn!(
                summary = notification.summary.as_str(),
                life_ms = life_ms,
                "{}",
                notification.detail
            ),
            NotificationSeverity::Success | NotificationSeverity::Info => info!(
                summary = notification.summary.as_str(),
                life_ms = life_ms,
                "{}",
                notification.detail
            ),
        }
    }
}
