use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::endpoint::EndpointId;

/// Outcome classification of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Down,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Up => "up",
            CheckStatus::Down => "down",
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, CheckStatus::Up)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one probe, before persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckResult {
    pub status: CheckStatus,
    /// None when the probe could not be completed
    pub latency_ms: Option<u64>,
    /// HTTP status code, when a response was received
    pub status_code: Option<u16>,
}

impl CheckResult {
    pub fn up(latency_ms: u64) -> Self {
        Self {
            status: CheckStatus::Up,
            latency_ms: Some(latency_ms),
            status_code: None,
        }
    }

    /// A completed request with a non-success response
    pub fn down(latency_ms: u64) -> Self {
        Self {
            status: CheckStatus::Down,
            latency_ms: Some(latency_ms),
            status_code: None,
        }
    }

    /// Transport-level failure: no response, no timing
    pub fn unreachable() -> Self {
        Self {
            status: CheckStatus::Down,
            latency_ms: None,
            status_code: None,
        }
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }
}

/// A persisted check observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: u64,
    pub endpoint_id: EndpointId,
    pub latency_ms: Option<u64>,
    pub status: CheckStatus,
    pub observed_at: DateTime<Utc>,
}

/// Kind of alert raised for an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Down,
    Latency,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Down => "down",
            AlertKind::Latency => "latency",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted alert raise. Clears are not recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: u64,
    pub endpoint_id: EndpointId,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    /// Observed latency for latency alerts
    pub value: Option<u64>,
    pub created_at: DateTime<Utc>,
}
