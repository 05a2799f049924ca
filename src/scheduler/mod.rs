//! Sweep scheduling
//!
//! ```text
//! tick → load endpoints → (bounded fan-out) probe → transition → commit
//!      → join → sleep poll_interval → tick ...
//! ```
//!
//! Sweeps never overlap and missed time is not caught up. A failure to load
//! the endpoint set skips one sweep; a failure to persist one endpoint only
//! drops that endpoint's check.

pub mod config;
pub mod sweep;

pub use config::{SchedulerConfig, DEFAULT_MAX_CONCURRENT_PROBES, DEFAULT_POLL_INTERVAL};
pub use sweep::{SweepError, SweepReport, SweepScheduler};
