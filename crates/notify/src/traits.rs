//! Notifier trait definition and shared error types.

use serde::Serialize;

use ratewatch_core::ProjectId;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// An alert ready for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct AlertNotification {
    pub project_id: ProjectId,
    /// Alert category (e.g. "event_rate").
    pub alert_type: String,
    /// Discriminator within the category.
    pub ident: String,
    /// Human-readable summary of observed vs. expected rate.
    pub message: String,
    /// User ids the alert is addressed to.
    pub recipients: Vec<u64>,
}

/// Trait for notification channel implementations.
///
/// Delivery is fire-and-forget from the engine's point of view: a failed
/// send is logged by the caller but never rolls back dedup bookkeeping.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn notify(&self, notification: &AlertNotification) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g. "webhook", "log").
    fn channel_name(&self) -> &str;
}
