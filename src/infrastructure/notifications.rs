use crate::domain::notification::Notification;
use crate::domain::ports::NotificationSink;
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Hands notifications to the log. Stands in for an SMS/push gateway, which
/// lives outside this service.
#[derive(Default, Clone)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn enqueue(&self, notification: Notification) -> Result<()> {
        info!(
            target: "farepay::notifications",
            recipient = ?notification.recipient,
            kind = ?notification.kind,
            transaction_id = %notification.transaction_id,
            amount = %notification.amount,
            currency = %notification.currency,
            "notification queued"
        );
        Ok(())
    }
}
