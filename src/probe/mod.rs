pub mod prober;

pub use prober::{classify_status, ProbeError, Prober, DEFAULT_PROBE_TIMEOUT};
