//! alert-worker — runs the adaptive alerting engine on a fixed tick.
//!
//! Discovers projects with recent counter activity once per tick, fans out
//! one evaluation task per project, and issues deduplicated alerts through
//! the configured notification channel.

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use ratewatch_core::{config, Config, NoopMetrics, SharedMetrics};
use ratewatch_engine::{AlertIssuer, AlertScheduler, ProjectEvaluator};
use ratewatch_notify::{LogNotifier, Notifier, WebhookNotifier};
use ratewatch_store::postgres::{self, PgAlertStore, PgCounterStore, PgThresholdSource};
use ratewatch_store::{
    AlertStore, CounterStore, MemoryAlertStore, MemoryCounterStore, StaticThresholds,
    ThresholdSource,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Adaptive alerting worker — rate anomaly detection over project counters.
#[derive(Parser, Debug)]
#[command(name = "alert-worker", version, about)]
struct Cli {
    /// Run a single scheduler tick and exit (for cron-style deployment).
    #[arg(long, default_value_t = false)]
    once: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    config::load_dotenv();
    let config = Config::from_env();
    config.validate()?;
    config.log_summary();

    // Storage: Postgres when configured, in-memory otherwise. The in-memory
    // stores start empty, which is only useful for local smoke runs.
    let (counters, thresholds, alerts): (
        Arc<dyn CounterStore>,
        Arc<dyn ThresholdSource>,
        Arc<dyn AlertStore>,
    ) = if config.postgres.is_configured() {
        let pool = postgres::connect(&config.postgres).await?;
        postgres::init_schema(&pool).await?;
        (
            Arc::new(PgCounterStore::new(pool.clone())),
            Arc::new(PgThresholdSource::new(pool.clone())),
            Arc::new(PgAlertStore::new(pool)),
        )
    } else {
        warn!("postgres not configured, using empty in-memory stores");
        (
            Arc::new(MemoryCounterStore::new()),
            Arc::new(StaticThresholds::new()),
            Arc::new(MemoryAlertStore::new()),
        )
    };

    let notifier: Arc<dyn Notifier> = match &config.webhook.url {
        Some(url) => {
            info!(url = %url, "alerts will be delivered via webhook");
            Arc::new(WebhookNotifier::new(url, HashMap::new())?)
        }
        None => {
            info!("no webhook configured, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let metrics: SharedMetrics = Arc::new(NoopMetrics);

    let issuer = AlertIssuer::new(
        alerts,
        notifier,
        config.engine.cooldown,
        metrics.clone(),
    );
    let evaluator = Arc::new(ProjectEvaluator::new(
        counters.clone(),
        thresholds,
        issuer,
        config.engine.clone(),
        metrics.clone(),
    ));
    let scheduler = AlertScheduler::new(counters, evaluator, config.engine.clone(), metrics);

    if cli.once {
        let outcomes = scheduler.run_tick(chrono::Utc::now()).await?;
        info!(evaluations = outcomes.len(), "single tick complete");
        return Ok(());
    }

    info!("alert-worker starting");
    tokio::select! {
        result = scheduler.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    info!("alert-worker exited cleanly");
    Ok(())
}
