use std::io::Write;

use async_trait::async_trait;
use tracing::info;

use crate::error::SinkError;

#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub source: &'static str,
    pub title: String,
    pub body: String,
    /// Eligible items in the feed when this notification fired.
    pub badge_count: usize,
    pub play_sound: bool,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), SinkError>;
}

/// Writes notifications to the log and rings the terminal bell.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        info!(
            source = notification.source,
            badge = notification.badge_count,
            "{}: {}",
            notification.title,
            notification.body
        );

        if notification.play_sound {
            let mut stderr = std::io::stderr();
            stderr
                .write_all(b"\x07")
                .and_then(|_| stderr.flush())
                .map_err(|e| SinkError(e.to_string()))?;
        }
        Ok(())
    }
}
