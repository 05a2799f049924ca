//! Alert lifecycle for monitored endpoints
//!
//! Converts a stream of check results into alert raises and clears. The
//! transition is a pure function; persisting its outcome is the sink's job.

pub mod state;

pub use state::{transition, AlertRaise, AlertState, AlertThresholds, Transition};
