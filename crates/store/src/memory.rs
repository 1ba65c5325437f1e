//! In-memory store implementations for tests and local runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ratewatch_core::{
    bucket_start_for, AlertKey, AlertRecord, AlertThreshold, CounterBucket, ProjectId,
};

use crate::error::StoreError;
use crate::traits::{AlertStore, CounterStore, ThresholdSource};

fn lock_err<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Lock(e.to_string())
}

// ── Counter store ───────────────────────────────────────────────────

/// Counter store holding minute buckets in a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    buckets: Mutex<HashMap<(ProjectId, DateTime<Utc>), u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` events to the bucket covering `ts`.
    pub fn record(&self, project_id: ProjectId, ts: DateTime<Utc>, count: u64) {
        let start = bucket_start_for(ts);
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        *buckets.entry((project_id, start)).or_insert(0) += count;
    }

    /// Insert a bucket with an exact start time, replacing any existing one.
    pub fn set_bucket(&self, project_id: ProjectId, bucket_start: DateTime<Utc>, count: u64) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets.insert((project_id, bucket_start), count);
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn active_buckets(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CounterBucket>, StoreError> {
        let buckets = self.buckets.lock().map_err(lock_err)?;
        let mut out: Vec<CounterBucket> = buckets
            .iter()
            .filter(|((_, start), count)| **count > 0 && *start > since && *start <= until)
            .map(|((project_id, bucket_start), count)| CounterBucket {
                project_id: *project_id,
                bucket_start: *bucket_start,
                count: *count,
            })
            .collect();
        out.sort_by_key(|b| (b.project_id, b.bucket_start));
        Ok(out)
    }

    async fn project_counts(
        &self,
        project_id: ProjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<u64>, StoreError> {
        let buckets = self.buckets.lock().map_err(lock_err)?;
        let mut rows: Vec<(DateTime<Utc>, u64)> = buckets
            .iter()
            .filter(|((pid, start), _)| *pid == project_id && *start >= from && *start < to)
            .map(|((_, start), count)| (*start, *count))
            .collect();
        rows.sort_by_key(|(start, _)| *start);
        Ok(rows.into_iter().map(|(_, count)| count).collect())
    }
}

// ── Threshold source ────────────────────────────────────────────────

/// Fixed per-project threshold overrides.
#[derive(Debug, Default)]
pub struct StaticThresholds {
    overrides: HashMap<ProjectId, AlertThreshold>,
}

impl StaticThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, project_id: ProjectId, threshold: AlertThreshold) -> Self {
        self.overrides.insert(project_id, threshold);
        self
    }
}

#[async_trait]
impl ThresholdSource for StaticThresholds {
    async fn threshold_for(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<AlertThreshold>, StoreError> {
        Ok(self.overrides.get(&project_id).copied())
    }
}

// ── Alert store ─────────────────────────────────────────────────────

/// Alert records in a mutex-guarded map.
///
/// The cooldown check and the write happen under one lock acquisition, which
/// gives the same single-notification guarantee as the SQL conditional
/// update.
#[derive(Debug, Default)]
pub struct MemoryAlertStore {
    records: Mutex<HashMap<AlertKey, AlertRecord>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn get(&self, key: &AlertKey) -> Result<Option<AlertRecord>, StoreError> {
        let records = self.records.lock().map_err(lock_err)?;
        Ok(records.get(key).cloned())
    }

    async fn try_mark_notified(
        &self,
        key: &AlertKey,
        now: DateTime<Utc>,
        cooldown: Duration,
        recipients: &[u64],
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock().map_err(lock_err)?;

        if let Some(existing) = records.get(key) {
            let elapsed = now.signed_duration_since(existing.last_notified_at);
            let cooldown = chrono::Duration::from_std(cooldown)
                .unwrap_or_else(|_| chrono::Duration::zero());
            if elapsed < cooldown {
                return Ok(false);
            }
        }

        records.insert(
            key.clone(),
            AlertRecord {
                key: key.clone(),
                last_notified_at: now,
                notified_user_ids: recipients.to_vec(),
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, min, sec).unwrap()
    }

    #[tokio::test]
    async fn active_buckets_filters_window_and_zero_counts() {
        let store = MemoryCounterStore::new();
        store.set_bucket(ProjectId(1), at(10, 0), 5);
        store.set_bucket(ProjectId(1), at(11, 0), 0);
        store.set_bucket(ProjectId(2), at(9, 0), 3); // outside window

        let buckets = store.active_buckets(at(9, 0), at(11, 0)).await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].project_id, ProjectId(1));
        assert_eq!(buckets[0].count, 5);
    }

    #[tokio::test]
    async fn project_counts_ordered_and_bounded() {
        let store = MemoryCounterStore::new();
        for (min, count) in [(10, 4), (12, 6), (11, 5), (13, 7)] {
            store.set_bucket(ProjectId(1), at(min, 0), count);
        }
        store.set_bucket(ProjectId(2), at(11, 0), 99);

        let counts = store
            .project_counts(ProjectId(1), at(10, 0), at(13, 0))
            .await
            .unwrap();
        assert_eq!(counts, vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn record_accumulates_within_minute() {
        let store = MemoryCounterStore::new();
        store.record(ProjectId(1), at(10, 5), 2);
        store.record(ProjectId(1), at(10, 40), 3);

        let counts = store
            .project_counts(ProjectId(1), at(10, 0), at(11, 0))
            .await
            .unwrap();
        assert_eq!(counts, vec![5]);
    }

    #[tokio::test]
    async fn try_mark_notified_respects_cooldown() {
        let store = MemoryAlertStore::new();
        let key = AlertKey::new(ProjectId(1), "event_rate", "per_minute");
        let cooldown = Duration::from_secs(600);

        assert!(store
            .try_mark_notified(&key, at(10, 0), cooldown, &[1, 2])
            .await
            .unwrap());
        // Within cooldown: suppressed.
        assert!(!store
            .try_mark_notified(&key, at(15, 0), cooldown, &[1, 2])
            .await
            .unwrap());
        // Past cooldown: fires again.
        assert!(store
            .try_mark_notified(&key, at(20, 0), cooldown, &[1, 2])
            .await
            .unwrap());

        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.last_notified_at, at(20, 0));
        assert_eq!(record.notified_user_ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn static_thresholds_fallback_is_none() {
        let source = StaticThresholds::new().with_override(
            ProjectId(1),
            AlertThreshold {
                threshold_pct: 150,
                min_events: 5,
            },
        );
        assert!(source.threshold_for(ProjectId(1)).await.unwrap().is_some());
        assert!(source.threshold_for(ProjectId(2)).await.unwrap().is_none());
    }
}
