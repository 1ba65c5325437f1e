//! Full-pipeline scenarios: counter store → scheduler tick → evaluation →
//! baseline → detection → dedup → notification.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use ratewatch_core::config::EngineConfig;
use ratewatch_core::{AlertThreshold, NoopMetrics, ProjectId};
use ratewatch_engine::evaluator::Outcome;
use ratewatch_engine::{AlertIssuer, AlertScheduler, ProjectEvaluator};
use ratewatch_notify::{AlertNotification, Notifier, NotifyError};
use ratewatch_store::{MemoryAlertStore, MemoryCounterStore, StaticThresholds};

/// Captures every delivered notification for assertions.
#[derive(Default)]
struct CapturingNotifier {
    sent: AtomicUsize,
    messages: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Notifier for CapturingNotifier {
    async fn notify(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.messages
            .lock()
            .unwrap()
            .push(notification.message.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "capturing"
    }
}

const HISTORY: [u64; 8] = [10, 12, 9, 11, 10, 13, 10, 11];

struct Harness {
    counters: Arc<MemoryCounterStore>,
    notifier: Arc<CapturingNotifier>,
    scheduler: AlertScheduler,
}

fn harness() -> Harness {
    let config = EngineConfig {
        default_threshold: AlertThreshold {
            threshold_pct: 150,
            min_events: 5,
        },
        cooldown: Duration::from_secs(600),
        ..Default::default()
    };

    let counters = Arc::new(MemoryCounterStore::new());
    let notifier = Arc::new(CapturingNotifier::default());
    let issuer = AlertIssuer::new(
        Arc::new(MemoryAlertStore::new()),
        notifier.clone(),
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
    let scheduler = AlertScheduler::new(
        counters.clone(),
        evaluator,
        config,
        Arc::new(NoopMetrics),
    );

    Harness {
        counters,
        notifier,
        scheduler,
    }
}

fn open_bucket_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
}

fn seed_history(h: &Harness, project: ProjectId) {
    for (i, count) in HISTORY.iter().enumerate() {
        let start = open_bucket_start()
            - chrono::Duration::minutes(HISTORY.len() as i64 - i as i64);
        h.counters.set_bucket(project, start, *count);
    }
}

#[tokio::test]
async fn spike_raises_alert_with_rate_message() {
    let h = harness();
    let project = ProjectId(42);
    seed_history(&h, project);
    // 40 events accumulated 30 seconds into the open minute.
    h.counters.set_bucket(project, open_bucket_start(), 40);

    let now = open_bucket_start() + chrono::Duration::seconds(30);
    let outcomes = h.scheduler.run_tick(now).await.unwrap();

    assert_eq!(outcomes, vec![Outcome::Alerted]);
    assert_eq!(h.notifier.sent.load(Ordering::SeqCst), 1);
    // History mean 10.75, sample stddev ~1.28: expected bound ~13/min,
    // observed extrapolates to 80/min.
    let messages = h.notifier.messages.lock().unwrap();
    assert_eq!(
        messages[0],
        "Rate of events per minute increased from 13 to 80"
    );
}

#[tokio::test]
async fn steady_rate_raises_nothing() {
    let h = harness();
    let project = ProjectId(42);
    seed_history(&h, project);
    // 12 events over the full minute: ~89% of the expected bound.
    h.counters.set_bucket(project, open_bucket_start(), 12);

    let now = open_bucket_start() + chrono::Duration::seconds(60);
    let outcomes = h.scheduler.run_tick(now).await.unwrap();

    assert_eq!(outcomes, vec![Outcome::Normal]);
    assert_eq!(h.notifier.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn consecutive_spiking_ticks_notify_once_per_cooldown() {
    let h = harness();
    let project = ProjectId(42);
    seed_history(&h, project);
    h.counters.set_bucket(project, open_bucket_start(), 40);

    let now = open_bucket_start() + chrono::Duration::seconds(30);
    assert_eq!(
        h.scheduler.run_tick(now).await.unwrap(),
        vec![Outcome::Alerted]
    );

    // The spike keeps going later in the same open bucket.
    h.counters.set_bucket(project, open_bucket_start(), 80);
    let later = now + chrono::Duration::seconds(29);
    assert_eq!(
        h.scheduler.run_tick(later).await.unwrap(),
        vec![Outcome::Suppressed]
    );
    assert_eq!(h.notifier.sent.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn new_project_without_history_is_skipped() {
    let h = harness();
    let project = ProjectId(7);
    // Only the open bucket exists.
    h.counters.set_bucket(project, open_bucket_start(), 500);

    let now = open_bucket_start() + chrono::Duration::seconds(30);
    let outcomes = h.scheduler.run_tick(now).await.unwrap();

    assert_eq!(outcomes, vec![Outcome::InsufficientHistory]);
    assert_eq!(h.notifier.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn idle_window_dispatches_nothing() {
    let h = harness();
    seed_history(&h, ProjectId(42)); // history only, nothing in the window

    let now = open_bucket_start() + chrono::Duration::seconds(30);
    let outcomes = h.scheduler.run_tick(now).await.unwrap();
    assert!(outcomes.is_empty());
}
