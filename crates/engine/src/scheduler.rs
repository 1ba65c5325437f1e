//! Scheduler tick and per-project fan-out.
//!
//! Once per tick the scheduler discovers every project with activity inside
//! the trailing normalization window and submits one evaluation task per
//! project. Submission is fire-and-forget; evaluation results are side
//! effects only. Counter reads are non-destructive, so a duplicated or
//! re-run tick cannot corrupt anything downstream — duplicate requests
//! resolve in the evaluator (idempotent reads) and the issuer (cooldown).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use ratewatch_core::config::EngineConfig;
use ratewatch_core::{CounterBucket, SharedMetrics};
use ratewatch_store::CounterStore;

use crate::error::EngineError;
use crate::evaluator::{EvaluationRequest, ProjectEvaluator};
use crate::rate::normalized_rate;

pub struct AlertScheduler {
    counters: Arc<dyn CounterStore>,
    evaluator: Arc<ProjectEvaluator>,
    config: EngineConfig,
    metrics: SharedMetrics,
    /// Bounds concurrent evaluations so a high project cardinality cannot
    /// overwhelm the counter store.
    limiter: Arc<Semaphore>,
}

impl AlertScheduler {
    pub fn new(
        counters: Arc<dyn CounterStore>,
        evaluator: Arc<ProjectEvaluator>,
        config: EngineConfig,
        metrics: SharedMetrics,
    ) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_evaluations));
        Self {
            counters,
            evaluator,
            config,
            metrics,
            limiter,
        }
    }

    /// Build evaluation requests for the buckets of one tick.
    fn build_requests(
        &self,
        buckets: Vec<CounterBucket>,
        now: DateTime<Utc>,
    ) -> Vec<EvaluationRequest> {
        let expiry = chrono::Duration::from_std(self.config.task_expiry)
            .unwrap_or_else(|_| chrono::Duration::seconds(120));

        buckets
            .into_iter()
            .map(|bucket| {
                let elapsed = now
                    .signed_duration_since(bucket.bucket_start)
                    .num_seconds()
                    .max(0) as u64;
                EvaluationRequest {
                    project_id: bucket.project_id,
                    evaluated_at: now,
                    normalized_rate: normalized_rate(bucket.count, elapsed),
                    expires_at: now + expiry,
                }
            })
            .collect()
    }

    /// One scheduler pass: discover active projects and fan out one
    /// evaluation task per project. Returns the number of tasks submitted.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let window = chrono::Duration::from_std(self.config.window)
            .unwrap_or_else(|_| chrono::Duration::minutes(1));
        let buckets = self.counters.active_buckets(now - window, now).await?;
        let requests = self.build_requests(buckets, now);
        let submitted = requests.len();

        for request in requests {
            self.submit(request);
        }

        debug!(submitted, "scheduler tick dispatched");
        self.metrics.incr("alerts.tasks_submitted", submitted as u64);
        Ok(submitted)
    }

    /// Spawn one evaluation task; the scheduler never waits on its result.
    fn submit(&self, request: EvaluationRequest) {
        let evaluator = self.evaluator.clone();
        let limiter = self.limiter.clone();
        tokio::spawn(async move {
            let _permit = match limiter.acquire_owned().await {
                Ok(permit) => permit,
                // Semaphore closed: engine is shutting down.
                Err(_) => return,
            };
            let started = Utc::now();
            match evaluator.evaluate(&request, started).await {
                Ok(outcome) => debug!(
                    project_id = %request.project_id,
                    rate = request.normalized_rate,
                    ?outcome,
                    "evaluation finished"
                ),
                Err(e) => warn!(
                    project_id = %request.project_id,
                    error = %e,
                    "evaluation failed"
                ),
            }
        });
    }

    /// Run one tick's evaluations inline and return their outcomes.
    ///
    /// Deterministic alternative to the spawning path, used by tests and
    /// one-shot runs.
    pub async fn run_tick(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<crate::evaluator::Outcome>, EngineError> {
        let window = chrono::Duration::from_std(self.config.window)
            .unwrap_or_else(|_| chrono::Duration::minutes(1));
        let buckets = self.counters.active_buckets(now - window, now).await?;
        let requests = self.build_requests(buckets, now);

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in &requests {
            outcomes.push(self.evaluator.evaluate(request, now).await?);
        }
        Ok(outcomes)
    }

    /// Drive ticks forever on the configured interval.
    ///
    /// The interval is validated to be at most the normalization window, so
    /// no bucket can slip between two ticks. A failed tick is logged and the
    /// loop continues; the next tick re-reads everything it needs.
    pub async fn run(&self) -> Result<(), EngineError> {
        info!(
            tick_secs = self.config.tick_interval.as_secs(),
            window_secs = self.config.window.as_secs(),
            "alert scheduler starting"
        );

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let now = Utc::now();
            if let Err(e) = self.tick(now).await {
                warn!(error = %e, "scheduler tick failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::TimeZone;

    use ratewatch_core::{AlertThreshold, NoopMetrics, ProjectId};
    use ratewatch_notify::{AlertNotification, Notifier, NotifyError};
    use ratewatch_store::{MemoryAlertStore, MemoryCounterStore, StaticThresholds};

    use crate::evaluator::Outcome;
    use crate::issuer::AlertIssuer;

    struct CountingNotifier {
        sent: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _n: &AlertNotification) -> Result<(), NotifyError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn channel_name(&self) -> &str {
            "counting"
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            default_threshold: AlertThreshold {
                threshold_pct: 150,
                min_events: 5,
            },
            cooldown: Duration::from_secs(600),
            ..Default::default()
        }
    }

    fn scheduler(
        counters: Arc<MemoryCounterStore>,
        notifier: Arc<CountingNotifier>,
        config: EngineConfig,
    ) -> AlertScheduler {
        let issuer = AlertIssuer::new(
            Arc::new(MemoryAlertStore::new()),
            notifier,
            config.cooldown,
            Arc::new(NoopMetrics),
        );
        let evaluator = Arc::new(ProjectEvaluator::new(
            counters.clone(),
            Arc::new(StaticThresholds::new()),
            issuer,
            config.clone(),
            Arc::new(NoopMetrics),
        ));
        AlertScheduler::new(counters, evaluator, config, Arc::new(NoopMetrics))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 30).unwrap()
    }

    #[tokio::test]
    async fn tick_submits_one_task_per_active_project() {
        let counters = Arc::new(MemoryCounterStore::new());
        let open = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        counters.set_bucket(ProjectId(1), open, 40);
        counters.set_bucket(ProjectId(2), open, 7);
        counters.set_bucket(ProjectId(3), open, 0); // no activity
        counters.set_bucket(ProjectId(4), open - chrono::Duration::minutes(5), 9); // stale

        let notifier = Arc::new(CountingNotifier {
            sent: AtomicUsize::new(0),
        });
        let sched = scheduler(counters, notifier, test_config());

        let submitted = sched.tick(now()).await.unwrap();
        assert_eq!(submitted, 2);
    }

    #[tokio::test]
    async fn requests_carry_normalized_rate_and_expiry() {
        let counters = Arc::new(MemoryCounterStore::new());
        let notifier = Arc::new(CountingNotifier {
            sent: AtomicUsize::new(0),
        });
        let sched = scheduler(counters, notifier, test_config());

        let open = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let buckets = vec![CounterBucket {
            project_id: ProjectId(1),
            bucket_start: open,
            count: 40,
        }];
        let requests = sched.build_requests(buckets, now());

        assert_eq!(requests.len(), 1);
        // 40 events over 30 elapsed seconds extrapolates to 80/min.
        assert_eq!(requests[0].normalized_rate, 80);
        assert_eq!(
            requests[0].expires_at,
            now() + chrono::Duration::seconds(120)
        );
    }

    #[tokio::test]
    async fn run_tick_evaluates_inline() {
        let counters = Arc::new(MemoryCounterStore::new());
        let open = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        // Project with an open bucket but no history: discovered, then
        // skipped for insufficient history.
        counters.set_bucket(ProjectId(1), open, 40);

        let notifier = Arc::new(CountingNotifier {
            sent: AtomicUsize::new(0),
        });
        let sched = scheduler(counters, notifier.clone(), test_config());

        let outcomes = sched.run_tick(now()).await.unwrap();
        assert_eq!(outcomes, vec![Outcome::InsufficientHistory]);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rerunning_a_tick_is_idempotent() {
        let counters = Arc::new(MemoryCounterStore::new());
        let open = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        counters.set_bucket(ProjectId(1), open, 40);
        for i in 1..=8 {
            counters.set_bucket(ProjectId(1), open - chrono::Duration::minutes(i), 10);
        }

        let notifier = Arc::new(CountingNotifier {
            sent: AtomicUsize::new(0),
        });
        let sched = scheduler(counters, notifier.clone(), test_config());

        // Duplicate trigger delivery: same tick runs twice.
        let first = sched.run_tick(now()).await.unwrap();
        let second = sched.run_tick(now()).await.unwrap();

        assert_eq!(first, vec![Outcome::Alerted]);
        assert_eq!(second, vec![Outcome::Suppressed]);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
    }
}
