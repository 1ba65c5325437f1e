use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::AlertThreshold;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub postgres: PostgresConfig,
    pub webhook: WebhookConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            engine: EngineConfig::from_env(),
            postgres: PostgresConfig::from_env(),
            webhook: WebhookConfig::from_env(),
        }
    }

    /// Validate cross-field invariants. Must be called before the engine
    /// starts; a config that fails here cannot produce a sound baseline.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.engine.validate()
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  engine:    window={}s, intervals={}, tick={}s, cooldown={}s",
            self.engine.window.as_secs(),
            self.engine.baseline_intervals,
            self.engine.tick_interval.as_secs(),
            self.engine.cooldown.as_secs(),
        );
        tracing::info!(
            "  defaults:  threshold_pct={}, min_events={}",
            self.engine.default_threshold.threshold_pct,
            self.engine.default_threshold.min_events,
        );
        tracing::info!("  postgres:  host={}, db={}", self.postgres.host, self.postgres.database);
        tracing::info!(
            "  webhook:   url={}",
            self.webhook.url.as_deref().unwrap_or("(none)")
        );
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Normalization window W: the trailing, possibly-incomplete bucket span
    /// evaluated each tick.
    pub window: Duration,
    /// Number of complete historical buckets (K) required for a baseline.
    pub baseline_intervals: u32,
    /// Process-wide threshold fallback when a project has no override.
    pub default_threshold: AlertThreshold,
    /// Minimum interval between two notifications for the same alert key.
    pub cooldown: Duration,
    /// Evaluation tasks older than this are dropped unprocessed.
    pub task_expiry: Duration,
    /// Scheduler tick period.
    pub tick_interval: Duration,
    /// Upper bound on concurrent per-project evaluations.
    pub max_concurrent_evaluations: usize,
    /// User ids alert notifications are addressed to. Recipient resolution
    /// is an external concern; this list is passed through the notification
    /// contract as-is.
    pub alert_recipients: Vec<u64>,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            window: Duration::from_secs(env_u64("ALERT_WINDOW_SECS", 60)),
            baseline_intervals: env_u32("ALERT_BASELINE_INTERVALS", 8),
            default_threshold: AlertThreshold {
                threshold_pct: env_u32("ALERT_DEFAULT_THRESHOLD_PCT", 500),
                min_events: env_u64("ALERT_DEFAULT_MIN_EVENTS", 25),
            },
            cooldown: env_opt("ALERT_COOLDOWN")
                .and_then(|s| parse_duration(&s))
                .unwrap_or(Duration::from_secs(30 * 60)),
            task_expiry: Duration::from_secs(env_u64("ALERT_TASK_EXPIRY_SECS", 120)),
            tick_interval: Duration::from_secs(env_u64("ALERT_TICK_INTERVAL_SECS", 60)),
            max_concurrent_evaluations: env_u64("ALERT_MAX_CONCURRENT_EVALUATIONS", 32) as usize,
            alert_recipients: env_opt("ALERT_RECIPIENTS")
                .map(|s| {
                    s.split(',')
                        .filter_map(|part| part.trim().parse().ok())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Enforce the invariants the statistics depend on.
    ///
    /// - Cooldown must exceed the normalization window, or a value observed
    ///   during an active alert could poison the next baseline.
    /// - Tick interval must not exceed the window, or buckets get skipped.
    /// - Sample stddev with the n-1 denominator needs at least two points.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.window.is_zero() {
            return Err(CoreError::Config("ALERT_WINDOW_SECS must be > 0".into()));
        }
        if self.baseline_intervals < 2 {
            return Err(CoreError::Config(
                "ALERT_BASELINE_INTERVALS must be >= 2 for sample stddev".into(),
            ));
        }
        if self.cooldown <= self.window {
            return Err(CoreError::Config(format!(
                "ALERT_COOLDOWN ({}s) must be strictly greater than the normalization window ({}s)",
                self.cooldown.as_secs(),
                self.window.as_secs(),
            )));
        }
        if self.tick_interval > self.window {
            return Err(CoreError::Config(format!(
                "ALERT_TICK_INTERVAL_SECS ({}s) must not exceed the normalization window ({}s)",
                self.tick_interval.as_secs(),
                self.window.as_secs(),
            )));
        }
        if self.max_concurrent_evaluations == 0 {
            return Err(CoreError::Config(
                "ALERT_MAX_CONCURRENT_EVALUATIONS must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// The window length in whole minutes (at least 1), the unit the
    /// expected rate is expressed in.
    pub fn window_minutes(&self) -> u64 {
        (self.window.as_secs() / 60).max(1)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            baseline_intervals: 8,
            default_threshold: AlertThreshold {
                threshold_pct: 500,
                min_events: 25,
            },
            cooldown: Duration::from_secs(30 * 60),
            task_expiry: Duration::from_secs(120),
            tick_interval: Duration::from_secs(60),
            max_concurrent_evaluations: 32,
            alert_recipients: Vec::new(),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("PG_HOST", "localhost"),
            port: env_u16("PG_PORT", 5432),
            database: env_or("PG_DATABASE", "ratewatch"),
            username: env_opt("PG_USERNAME"),
            password: env_opt("PG_PASSWORD"),
            ssl_mode: env_or("PG_SSL_MODE", "prefer"),
            max_connections: env_u32("PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Webhook notification ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Target URL for alert notifications. When unset, alerts are only
    /// logged.
    pub url: Option<String>,
}

impl WebhookConfig {
    fn from_env() -> Self {
        Self {
            url: env_opt("ALERT_WEBHOOK_URL"),
        }
    }
}

// ── Duration parsing ──────────────────────────────────────────

/// Parse a human-readable duration string into a [`Duration`].
///
/// Supports components: `Xd` (days), `Xh` (hours), `Xm` (minutes), `Xs`
/// (seconds). Components can be combined: "2h30m", "1d12h", "90s". A bare
/// number is treated as seconds. Returns `None` if unparseable.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total_secs: u64 = 0;
    let mut num_buf = String::new();
    let mut found_unit = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
        } else {
            let n: u64 = num_buf.parse().ok()?;
            num_buf.clear();
            match ch {
                'd' => total_secs += n * 86_400,
                'h' => total_secs += n * 3_600,
                'm' => total_secs += n * 60,
                's' => total_secs += n,
                _ => return None,
            }
            found_unit = true;
        }
    }

    // Handle trailing number without unit (treat as seconds).
    if !num_buf.is_empty() {
        if found_unit {
            // Ambiguous: "30m15" -- ignore the whole string.
            return None;
        }
        let n: u64 = num_buf.parse().ok()?;
        total_secs += n;
    }

    if total_secs == 0 && !found_unit {
        return None;
    }

    Some(Duration::from_secs(total_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_components() {
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_duration("2h30m"), Some(Duration::from_secs(9000)));
        assert_eq!(parse_duration("1d"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("30m15"), None);
        assert_eq!(parse_duration("5x"), None);
    }

    #[test]
    fn default_engine_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn cooldown_must_exceed_window() {
        let cfg = EngineConfig {
            cooldown: Duration::from_secs(60),
            window: Duration::from_secs(60),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tick_must_not_exceed_window() {
        let cfg = EngineConfig {
            tick_interval: Duration::from_secs(120),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn baseline_intervals_minimum() {
        let cfg = EngineConfig {
            baseline_intervals: 1,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
