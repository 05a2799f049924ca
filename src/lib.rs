//! nethealth: HTTP endpoint health monitoring
//!
//! Periodically probes a set of registered HTTP endpoints, records latency and
//! up/down status for every check, and drives a per-endpoint alert state
//! machine that raises an alert on sustained failure or excess latency and
//! clears it once the endpoint is healthy again.
//!
//! # Features
//!
//! - **Bounded probing**: every probe has a hard deadline; sweeps fan out with a
//!   concurrency limit and never overlap
//! - **Alert hysteresis**: one event per incident, cleared only by a clean check
//! - **Atomic commits**: measurement, alert state and event are written together
//! - **Snapshots**: the store is periodically written to disk and restored at start-up
//! - **HTTP API**: endpoint registry, alert configuration, history and stats
//!
//! # Example
//!
//! ```no_run
//! use nethealth::data::EndpointSpec;
//! use nethealth::probe::Prober;
//! use nethealth::scheduler::{SchedulerConfig, SweepScheduler};
//! use nethealth::storage::ObservationStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(ObservationStore::new());
//! store.create_endpoint(EndpointSpec::new("api", "https://example.com/health"))?;
//!
//! let config = SchedulerConfig::default();
//! let prober = Prober::new(config.probe_timeout)?;
//! let scheduler = SweepScheduler::new(store.clone(), store.clone(), prober, config);
//!
//! let report = scheduler.run_sweep().await?;
//! println!("{} up, {} down", report.up, report.down);
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod config;
pub mod data;
pub mod probe;
pub mod query;
pub mod scheduler;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use alerts::{transition, AlertState, AlertThresholds};
pub use data::{AlertEvent, CheckResult, CheckStatus, Endpoint, Measurement};
pub use probe::Prober;
pub use scheduler::{SchedulerConfig, SweepScheduler};
pub use storage::{ObservationStore, StorageError};
