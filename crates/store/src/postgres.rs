//! PostgreSQL-backed store implementations.
//!
//! Counter rows are written by the ingestion side; this crate only reads
//! them. Alert records are the one table the engine writes, and only through
//! the conditional update in [`AlertStore::try_mark_notified`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use ratewatch_core::config::PostgresConfig;
use ratewatch_core::{AlertKey, AlertRecord, AlertThreshold, CounterBucket, ProjectId};

use crate::error::StoreError;
use crate::traits::{AlertStore, CounterStore, ThresholdSource};

/// Connect a pool using the engine's Postgres config.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await?;
    info!(
        host = %config.host,
        database = %config.database,
        "connected to postgres"
    );
    Ok(pool)
}

/// Create the tables the engine reads and writes, if absent.
pub async fn init_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_counters (
            project_id   BIGINT      NOT NULL,
            bucket_start TIMESTAMPTZ NOT NULL,
            count        BIGINT      NOT NULL DEFAULT 0,
            PRIMARY KEY (project_id, bucket_start)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_alert_thresholds (
            project_id    BIGINT PRIMARY KEY,
            threshold_pct INTEGER NOT NULL,
            min_events    BIGINT  NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alert_records (
            project_id        BIGINT      NOT NULL,
            alert_type        TEXT        NOT NULL,
            ident             TEXT        NOT NULL,
            last_notified_at  TIMESTAMPTZ NOT NULL,
            notified_user_ids BIGINT[]    NOT NULL DEFAULT '{}',
            PRIMARY KEY (project_id, alert_type, ident)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Counter store ───────────────────────────────────────────────────

pub struct PgCounterStore {
    pool: PgPool,
}

impl PgCounterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BucketRow {
    project_id: i64,
    bucket_start: DateTime<Utc>,
    count: i64,
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn active_buckets(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CounterBucket>, StoreError> {
        let rows = sqlx::query_as::<_, BucketRow>(
            r#"
            SELECT project_id, bucket_start, count
            FROM project_counters
            WHERE bucket_start > $1 AND bucket_start <= $2 AND count > 0
            ORDER BY project_id, bucket_start
            "#,
        )
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CounterBucket {
                project_id: ProjectId(r.project_id as u64),
                bucket_start: r.bucket_start,
                count: r.count.max(0) as u64,
            })
            .collect())
    }

    async fn project_counts(
        &self,
        project_id: ProjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<u64>, StoreError> {
        let rows = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT count
            FROM project_counters
            WHERE project_id = $1 AND bucket_start >= $2 AND bucket_start < $3
            ORDER BY bucket_start
            "#,
        )
        .bind(project_id.0 as i64)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(c,)| c.max(0) as u64).collect())
    }
}

// ── Threshold source ────────────────────────────────────────────────

pub struct PgThresholdSource {
    pool: PgPool,
}

impl PgThresholdSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ThresholdSource for PgThresholdSource {
    async fn threshold_for(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<AlertThreshold>, StoreError> {
        let row = sqlx::query_as::<_, (i32, i64)>(
            r#"
            SELECT threshold_pct, min_events
            FROM project_alert_thresholds
            WHERE project_id = $1
            "#,
        )
        .bind(project_id.0 as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(threshold_pct, min_events)| AlertThreshold {
            threshold_pct: threshold_pct.max(0) as u32,
            min_events: min_events.max(0) as u64,
        }))
    }
}

// ── Alert store ─────────────────────────────────────────────────────

pub struct PgAlertStore {
    pool: PgPool,
}

impl PgAlertStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    last_notified_at: DateTime<Utc>,
    notified_user_ids: Vec<i64>,
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn get(&self, key: &AlertKey) -> Result<Option<AlertRecord>, StoreError> {
        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT last_notified_at, notified_user_ids
            FROM alert_records
            WHERE project_id = $1 AND alert_type = $2 AND ident = $3
            "#,
        )
        .bind(key.project_id.0 as i64)
        .bind(&key.alert_type)
        .bind(&key.ident)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AlertRecord {
            key: key.clone(),
            last_notified_at: r.last_notified_at,
            notified_user_ids: r
                .notified_user_ids
                .into_iter()
                .map(|id| id.max(0) as u64)
                .collect(),
        }))
    }

    async fn try_mark_notified(
        &self,
        key: &AlertKey,
        now: DateTime<Utc>,
        cooldown: Duration,
        recipients: &[u64],
    ) -> Result<bool, StoreError> {
        let cutoff = now
            - chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::zero());
        let ids: Vec<i64> = recipients.iter().map(|id| *id as i64).collect();

        // Insert-or-conditionally-update in one statement: the UPDATE arm
        // only applies when the existing record is past the cooldown, so the
        // row count tells us whether this caller won the race.
        let result = sqlx::query(
            r#"
            INSERT INTO alert_records
                (project_id, alert_type, ident, last_notified_at, notified_user_ids)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (project_id, alert_type, ident) DO UPDATE
                SET last_notified_at = EXCLUDED.last_notified_at,
                    notified_user_ids = EXCLUDED.notified_user_ids
                WHERE alert_records.last_notified_at <= $6
            "#,
        )
        .bind(key.project_id.0 as i64)
        .bind(&key.alert_type)
        .bind(&key.ident)
        .bind(now)
        .bind(&ids)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
