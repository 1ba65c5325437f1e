//! Shared domain types for the alerting engine.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a project whose event stream is being watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One minute of accumulated event counts for a project.
///
/// Owned by the counter store. A bucket is append-only while its minute is
/// still open and immutable once the minute has elapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterBucket {
    pub project_id: ProjectId,
    /// Start of the minute this bucket covers (seconds/nanos zeroed).
    pub bucket_start: DateTime<Utc>,
    pub count: u64,
}

/// Truncate a timestamp to the start of its minute bucket.
pub fn bucket_start_for(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Per-project alerting thresholds, with a process-wide default fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThreshold {
    /// Percentage over baseline above which an alert fires. Zero disables
    /// alerting for the project.
    pub threshold_pct: u32,
    /// Minimum normalized events per minute required before the signal is
    /// trusted at all.
    pub min_events: u64,
}

/// Identity of a distinct alert condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    pub project_id: ProjectId,
    /// Alert category (e.g. "event_rate").
    pub alert_type: String,
    /// Discriminator within the category.
    pub ident: String,
}

impl AlertKey {
    pub fn new(project_id: ProjectId, alert_type: impl Into<String>, ident: impl Into<String>) -> Self {
        Self {
            project_id,
            alert_type: alert_type.into(),
            ident: ident.into(),
        }
    }
}

impl std::fmt::Display for AlertKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.project_id, self.alert_type, self.ident)
    }
}

/// Durable dedup bookkeeping for one alert condition.
///
/// Created on the first trigger of a key and updated on every trigger that
/// survives the cooldown check. Never deleted by the engine; retention is an
/// external concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub key: AlertKey,
    pub last_notified_at: DateTime<Utc>,
    pub notified_user_ids: Vec<u64>,
}
