//! Storage contracts for the alerting engine.
//!
//! This crate provides:
//! - `CounterStore`, `ThresholdSource`, and `AlertStore` traits — the narrow
//!   contracts the engine holds against its external collaborators
//! - In-memory implementations for tests and local runs
//! - PostgreSQL implementations backed by sqlx

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::StoreError;
pub use memory::{MemoryAlertStore, MemoryCounterStore, StaticThresholds};
pub use traits::{AlertStore, CounterStore, ThresholdSource};
