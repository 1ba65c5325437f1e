//! Trait contracts between the engine and its storage collaborators.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ratewatch_core::{AlertKey, AlertRecord, AlertThreshold, CounterBucket, ProjectId};

use crate::error::StoreError;

/// Read-only access to per-project, per-minute event counters.
///
/// All reads are non-destructive, so a scheduler tick can be re-run or
/// duplicated without side effects. Implementations must provide at least
/// monotonic-read consistency.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// All buckets with `count > 0` whose start falls in `(since, until]`,
    /// across every project. Used by the scheduler to discover projects with
    /// recent activity.
    async fn active_buckets(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CounterBucket>, StoreError>;

    /// Counts for one project's buckets with start in `[from, to)`, in
    /// ascending bucket order. Minutes with no stored bucket are simply
    /// absent; callers detect gaps by the number of points returned.
    async fn project_counts(
        &self,
        project_id: ProjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<u64>, StoreError>;
}

/// Per-project alert threshold overrides.
///
/// Returns `None` when a project has no override; the caller applies the
/// process-wide default. A missing override is never an error.
#[async_trait]
pub trait ThresholdSource: Send + Sync {
    async fn threshold_for(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<AlertThreshold>, StoreError>;
}

/// Durable dedup bookkeeping for issued alerts.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Fetch the record for an alert key, if one exists.
    async fn get(&self, key: &AlertKey) -> Result<Option<AlertRecord>, StoreError>;

    /// Conditionally mark the key as notified at `now`.
    ///
    /// Succeeds (returns `true`) only when no record exists for the key or
    /// the existing `last_notified_at` is at least `cooldown` old. The check
    /// and the write are a single atomic step, so two racing evaluations for
    /// the same key cannot both succeed within one cooldown interval.
    async fn try_mark_notified(
        &self,
        key: &AlertKey,
        now: DateTime<Utc>,
        cooldown: Duration,
        recipients: &[u64],
    ) -> Result<bool, StoreError>;
}
