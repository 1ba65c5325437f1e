//! Adaptive alerting engine.
//!
//! Watches per-project, per-minute event counts, compares the current rate
//! against a rolling statistical baseline, and raises deduplicated alerts
//! when the rate departs significantly from normal.
//!
//! Pipeline: scheduler tick → active-project discovery → rate normalization
//! → per-project evaluation task → baseline → anomaly detection → dedup and
//! notification.

pub mod baseline;
pub mod detector;
pub mod error;
pub mod evaluator;
pub mod issuer;
pub mod rate;
pub mod scheduler;

pub use baseline::Baseline;
pub use detector::AlertCandidate;
pub use error::EngineError;
pub use evaluator::{EvaluationRequest, Outcome, ProjectEvaluator};
pub use issuer::AlertIssuer;
pub use rate::normalized_rate;
pub use scheduler::AlertScheduler;
