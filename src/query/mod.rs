//! Read-side views over the observation store

pub mod stats;
pub mod summary;

pub use stats::{window_stats, window_stats_at, WindowStats, DEFAULT_WINDOW_HOURS};
pub use summary::{endpoint_summaries, EndpointSummary};
