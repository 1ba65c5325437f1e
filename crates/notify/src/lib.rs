//! Notification contract for the alerting engine.
//!
//! This crate provides:
//! - `Notifier` trait — the fire-and-forget delivery contract the alert
//!   issuer holds against the external notification collaborator
//! - Webhook notifier delivering alerts as JSON over HTTP
//! - Log notifier used when no delivery target is configured

pub mod log;
pub mod traits;
pub mod webhook;

pub use log::LogNotifier;
pub use traits::{AlertNotification, Notifier, NotifyError};
pub use webhook::WebhookNotifier;
