pub mod endpoint;
pub mod observation;

pub use endpoint::{
    validate_url, Endpoint, EndpointError, EndpointId, EndpointSpec, EndpointUpdate,
    DEFAULT_CONSECUTIVE_FAIL_THRESHOLD, DEFAULT_LATENCY_THRESHOLD_MS,
};
pub use observation::{AlertEvent, AlertKind, CheckResult, CheckStatus, Measurement};
