//! Anomaly decision: current rate vs. expected rate.

use ratewatch_core::AlertThreshold;
use tracing::debug;

/// An anomaly that passed the threshold check, ready for dedup and issuing.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCandidate {
    /// Normalized events per minute that triggered the decision.
    pub observed: u64,
    /// Baseline upper bound the observation was judged against.
    pub expected: f64,
    /// Human-readable summary for the notification.
    pub message: String,
}

/// Decide alert / no-alert for one normalized observation.
///
/// No alert when the project's threshold is zero (alerting disabled), when
/// the rate is below the minimum-events floor (too little volume to trust
/// the signal), or when the percentage over baseline does not *strictly*
/// exceed the threshold.
///
/// A zero expected rate cannot be divided through, and the policy here is:
/// a project that was silent for the whole lookback and is now past the
/// events floor is alert-eligible. Silence followed by traffic is exactly
/// the kind of departure this engine exists to catch.
pub fn evaluate(
    normalized_rate: u64,
    expected_rate: f64,
    threshold: AlertThreshold,
) -> Option<AlertCandidate> {
    if threshold.threshold_pct == 0 {
        return None;
    }
    if normalized_rate < threshold.min_events {
        debug!(
            normalized_rate,
            min_events = threshold.min_events,
            "below minimum-events floor, skipping"
        );
        return None;
    }

    let fires = if expected_rate <= 0.0 {
        normalized_rate > 0
    } else {
        let ratio = normalized_rate as f64 / expected_rate * 100.0;
        ratio > threshold.threshold_pct as f64
    };

    if !fires {
        return None;
    }

    Some(AlertCandidate {
        observed: normalized_rate,
        expected: expected_rate,
        message: format!(
            "Rate of events per minute increased from {} to {}",
            expected_rate.max(0.0).floor() as u64,
            normalized_rate
        ),
    })
}
