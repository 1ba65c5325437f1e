//! Per-project evaluation: one request in, one alert/no-alert decision out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use ratewatch_core::config::EngineConfig;
use ratewatch_core::{AlertKey, ProjectId, SharedMetrics};
use ratewatch_store::{CounterStore, ThresholdSource};

use crate::baseline::Baseline;
use crate::detector;
use crate::error::EngineError;
use crate::issuer::AlertIssuer;

/// Alert category issued by this engine.
pub const ALERT_TYPE: &str = "event_rate";
/// Condition discriminator within the category.
pub const ALERT_IDENT: &str = "per_minute";

/// One unit of evaluation work, created by the scheduler and consumed
/// exactly once. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub project_id: ProjectId,
    /// The instant the scheduler observed the open bucket.
    pub evaluated_at: DateTime<Utc>,
    /// Extrapolated full-minute rate at observation time.
    pub normalized_rate: u64,
    /// Past this instant the request is stale and must be dropped.
    pub expires_at: DateTime<Utc>,
}

/// What an evaluation decided. The scheduler only logs it; tests and
/// metrics consumers care about the distinctions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Request sat in the queue past its expiry; dropped without side
    /// effects.
    Expired,
    /// Alerting disabled for the project (zero threshold).
    Disabled,
    /// Rate below the minimum-events floor.
    BelowFloor,
    /// History did not contain the required number of complete buckets.
    InsufficientHistory,
    /// Baseline held; nothing anomalous.
    Normal,
    /// Anomaly detected and notification issued.
    Alerted,
    /// Anomaly detected but suppressed by the cooldown.
    Suppressed,
}

/// Evaluates one project's current rate against its rolling baseline.
pub struct ProjectEvaluator {
    counters: Arc<dyn CounterStore>,
    thresholds: Arc<dyn ThresholdSource>,
    issuer: AlertIssuer,
    config: EngineConfig,
    metrics: SharedMetrics,
}

impl ProjectEvaluator {
    pub fn new(
        counters: Arc<dyn CounterStore>,
        thresholds: Arc<dyn ThresholdSource>,
        issuer: AlertIssuer,
        config: EngineConfig,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            counters,
            thresholds,
            issuer,
            config,
            metrics,
        }
    }

    /// Process one evaluation request.
    ///
    /// `now` is the instant execution actually starts, which can be well
    /// after `request.evaluated_at` when the evaluation stage is backlogged.
    /// Re-running the same request is harmless: reads are idempotent and the
    /// issuer dedups notifications.
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
        now: DateTime<Utc>,
    ) -> Result<Outcome, EngineError> {
        if now >= request.expires_at {
            debug!(
                project_id = %request.project_id,
                evaluated_at = %request.evaluated_at,
                "evaluation request expired, dropping"
            );
            self.metrics.incr("alerts.task_expired", 1);
            return Ok(Outcome::Expired);
        }

        self.metrics.incr("alerts.evaluations", 1);

        let threshold = self
            .thresholds
            .threshold_for(request.project_id)
            .await?
            .unwrap_or(self.config.default_threshold);

        // Cheap rejections before touching history.
        if threshold.threshold_pct == 0 {
            return Ok(Outcome::Disabled);
        }
        if request.normalized_rate < threshold.min_events {
            return Ok(Outcome::BelowFloor);
        }

        // History spans the K complete windows preceding the open one; the
        // normalization window itself is excluded so the value being judged
        // cannot contaminate its own baseline.
        let window = chrono::Duration::from_std(self.config.window)
            .unwrap_or_else(|_| chrono::Duration::minutes(1));
        let intervals = self.config.baseline_intervals;
        let history_end = request.evaluated_at - window;
        let history_start = history_end - window * intervals as i32;

        let counts = self
            .counters
            .project_counts(request.project_id, history_start, history_end)
            .await?;

        let baseline = match Baseline::from_counts(&counts, intervals as usize) {
            Some(b) => b,
            None => {
                debug!(
                    project_id = %request.project_id,
                    points = counts.len(),
                    required = intervals,
                    "insufficient history, skipping"
                );
                return Ok(Outcome::InsufficientHistory);
            }
        };

        let expected_rate = baseline.expected_rate(self.config.window_minutes());

        let candidate =
            match detector::evaluate(request.normalized_rate, expected_rate, threshold) {
                Some(c) => c,
                None => return Ok(Outcome::Normal),
            };

        let key = AlertKey::new(request.project_id, ALERT_TYPE, ALERT_IDENT);
        let issued = self
            .issuer
            .maybe_alert(
                key,
                candidate.message,
                &self.config.alert_recipients,
                now,
            )
            .await?;

        Ok(if issued {
            Outcome::Alerted
        } else {
            Outcome::Suppressed
        })
    }
}
