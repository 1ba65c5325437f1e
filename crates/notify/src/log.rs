//! Notifier that only writes to the log.
//!
//! Default channel when no webhook URL is configured; alerts still show up
//! in structured logs and dedup bookkeeping behaves exactly as in
//! production.

use crate::traits::{AlertNotification, Notifier, NotifyError};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        tracing::info!(
            project_id = %notification.project_id,
            alert_type = %notification.alert_type,
            ident = %notification.ident,
            recipients = notification.recipients.len(),
            "ALERT: {}",
            notification.message,
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
