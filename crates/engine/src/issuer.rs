//! Alert deduplication and issuing.
//!
//! The single gate between anomaly candidates and outbound notifications.
//! Nothing else in the engine may call a [`Notifier`] directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use ratewatch_core::{AlertKey, SharedMetrics};
use ratewatch_notify::{AlertNotification, Notifier};
use ratewatch_store::AlertStore;

use crate::error::EngineError;

/// Records alert state per key and suppresses re-issuance within the
/// cooldown window.
pub struct AlertIssuer {
    alerts: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    cooldown: Duration,
    metrics: SharedMetrics,
}

impl AlertIssuer {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        notifier: Arc<dyn Notifier>,
        cooldown: Duration,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            alerts,
            notifier,
            cooldown,
            metrics,
        }
    }

    /// Issue an alert unless the key notified within the cooldown.
    ///
    /// The store performs the cooldown check and the bookkeeping write as one
    /// conditional update, so concurrent candidates for the same key resolve
    /// to a single notification. Suppression is expected steady-state
    /// behavior, not a failure. Delivery is fire-and-forget: a failed send is
    /// logged and the record update stands.
    ///
    /// Returns `true` when a notification went out.
    pub async fn maybe_alert(
        &self,
        key: AlertKey,
        message: String,
        recipients: &[u64],
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let won = self
            .alerts
            .try_mark_notified(&key, now, self.cooldown, recipients)
            .await?;

        if !won {
            debug!(key = %key, "alert suppressed: within cooldown");
            self.metrics.incr("alerts.suppressed", 1);
            return Ok(false);
        }

        self.metrics.incr("alerts.fired", 1);
        info!(key = %key, "alert issued: {message}");

        let notification = AlertNotification {
            project_id: key.project_id,
            alert_type: key.alert_type,
            ident: key.ident,
            message,
            recipients: recipients.to_vec(),
        };

        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(
                channel = self.notifier.channel_name(),
                error = %e,
                "alert notification delivery failed"
            );
            self.metrics.incr("alerts.delivery_failed", 1);
        }

        Ok(true)
    }
}
