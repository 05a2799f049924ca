use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::alerts::{AlertState, AlertThresholds};

/// Stable endpoint identifier assigned by the store
pub type EndpointId = u64;

/// Default latency alert threshold for new endpoints
pub const DEFAULT_LATENCY_THRESHOLD_MS: u64 = 1000;
/// Default number of consecutive down checks before a down alert
pub const DEFAULT_CONSECUTIVE_FAIL_THRESHOLD: u32 = 3;

/// A monitored endpoint with its alert configuration and alert state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    /// Display name
    pub name: String,
    /// Probe target
    pub url: String,
    /// Latency above this (while up) raises a latency alert
    pub latency_threshold_ms: u64,
    /// Consecutive down checks required to raise a down alert
    pub consecutive_fail_threshold: u32,
    /// Running count of consecutive down checks
    pub consecutive_failures: u32,
    /// Whether an unresolved alert exists
    pub alert_active: bool,
    /// Time of the most recent alert raise
    pub last_alert_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every committed check; guards the alert-state read-modify-write
    #[serde(default)]
    pub state_version: u64,
}

impl Endpoint {
    /// Current alert state fields
    pub fn alert_state(&self) -> AlertState {
        AlertState {
            consecutive_failures: self.consecutive_failures,
            alert_active: self.alert_active,
        }
    }

    /// Configured alert thresholds
    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            latency_threshold_ms: self.latency_threshold_ms,
            consecutive_fail_threshold: self.consecutive_fail_threshold,
        }
    }
}

/// Registration request for a new endpoint
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub name: String,
    pub url: String,
    pub thresholds: AlertThresholds,
}

impl EndpointSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            thresholds: AlertThresholds::default(),
        }
    }

    pub fn with_latency_threshold(mut self, latency_threshold_ms: u64) -> Self {
        self.thresholds.latency_threshold_ms = latency_threshold_ms;
        self
    }

    pub fn with_fail_threshold(mut self, consecutive_fail_threshold: u32) -> Self {
        self.thresholds.consecutive_fail_threshold = consecutive_fail_threshold;
        self
    }

    pub fn validate(&self) -> Result<(), EndpointError> {
        if self.name.trim().is_empty() {
            return Err(EndpointError::EmptyName);
        }
        validate_url(&self.url)?;
        self.thresholds.validate()
    }
}

/// Partial update of an endpoint's display fields
#[derive(Debug, Clone, Default)]
pub struct EndpointUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
}

impl EndpointUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none()
    }

    pub fn validate(&self) -> Result<(), EndpointError> {
        if self.is_empty() {
            return Err(EndpointError::NoChanges);
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(EndpointError::EmptyName);
            }
        }
        if let Some(url) = &self.url {
            validate_url(url)?;
        }
        Ok(())
    }
}

/// Probe targets must be absolute http(s) URLs
pub fn validate_url(url: &str) -> Result<(), EndpointError> {
    let parsed = Url::parse(url).map_err(|e| EndpointError::InvalidUrl(format!("{}: {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(EndpointError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            url, other
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EndpointError {
    #[error("Endpoint name must not be empty")]
    EmptyName,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("No fields to update")]
    NoChanges,
}
