//! Persistence boundary of the probing engine

use crate::alerts::Transition;
use crate::data::{AlertEvent, CheckResult, Endpoint, EndpointId, Measurement};

/// Read side used by the scheduler at the start of every sweep
pub trait EndpointRegistry: Send + Sync {
    /// All endpoints with their current alert state
    fn load_endpoints(&self) -> Result<Vec<Endpoint>, SinkError>;
}

/// Write side for check observations
pub trait ObservationSink: Send + Sync {
    /// Atomically append the measurement, apply the new alert state and
    /// append the alert event (if any). Nothing is written on error.
    fn commit_check(&self, commit: CheckCommit) -> Result<CommittedCheck, SinkError>;

    /// Append a measurement without touching alert state
    fn record_measurement(
        &self,
        endpoint_id: EndpointId,
        result: &CheckResult,
    ) -> Result<Measurement, SinkError>;
}

/// One endpoint's check outcome, ready to persist
#[derive(Debug, Clone)]
pub struct CheckCommit {
    pub endpoint_id: EndpointId,
    /// `state_version` observed when the endpoint was loaded
    pub expected_version: u64,
    pub result: CheckResult,
    pub transition: Transition,
}

#[derive(Debug, Clone)]
pub struct CommittedCheck {
    pub measurement: Measurement,
    pub event: Option<AlertEvent>,
    pub state_version: u64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("Endpoint {0} not found")]
    EndpointNotFound(EndpointId),

    #[error("Endpoint {endpoint_id} state changed concurrently (expected version {expected}, found {actual})")]
    Conflict {
        endpoint_id: EndpointId,
        expected: u64,
        actual: u64,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
