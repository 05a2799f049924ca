//! Endpoint alert state machine
//!
//! # States
//! - Healthy: `alert_active == false`
//! - Alerting: `alert_active == true`
//!
//! # Transitions
//! ```text
//! Healthy  → Alerting: down and consecutive failures >= fail threshold
//! Healthy  → Alerting: up and latency > latency threshold
//! Alerting → Healthy:  up and (latency unknown or latency <= latency threshold)
//! ```
//!
//! Raising requires crossing a threshold while clearing only needs one clean
//! `up`, and an active alert suppresses further raises until it clears, so an
//! incident produces exactly one event.

use serde::{Deserialize, Serialize};

use crate::data::{
    AlertKind, CheckResult, CheckStatus, EndpointError, DEFAULT_CONSECUTIVE_FAIL_THRESHOLD,
    DEFAULT_LATENCY_THRESHOLD_MS,
};

/// Mutable alert state carried by an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub consecutive_failures: u32,
    pub alert_active: bool,
}

/// Per-endpoint alert configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub latency_threshold_ms: u64,
    pub consecutive_fail_threshold: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            latency_threshold_ms: DEFAULT_LATENCY_THRESHOLD_MS,
            consecutive_fail_threshold: DEFAULT_CONSECUTIVE_FAIL_THRESHOLD,
        }
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<(), EndpointError> {
        if self.consecutive_fail_threshold < 1 {
            return Err(EndpointError::InvalidThreshold(
                "consecutive_fail_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// An alert to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRaise {
    pub kind: AlertKind,
    pub message: String,
    pub value: Option<u64>,
}

/// Result of feeding one check into the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: AlertState,
    pub raised: Option<AlertRaise>,
    /// An active alert was resolved by this check
    pub cleared: bool,
}

/// Compute the next alert state for one check result.
///
/// Pure: `last_alert_at` is stamped by the sink when `raised` is set.
pub fn transition(
    state: AlertState,
    result: &CheckResult,
    thresholds: &AlertThresholds,
) -> Transition {
    // Records that skipped validation still need a usable threshold
    let fail_threshold = thresholds.consecutive_fail_threshold.max(1);
    let latency_threshold = thresholds.latency_threshold_ms;

    let new_failures = match result.status {
        CheckStatus::Down => state.consecutive_failures.saturating_add(1),
        CheckStatus::Up => 0,
    };

    let raise_down = result.status == CheckStatus::Down
        && new_failures >= fail_threshold
        && !state.alert_active;

    let latency_breach = matches!(result.latency_ms, Some(ms) if ms > latency_threshold);
    let raise_latency =
        result.status == CheckStatus::Up && latency_breach && !state.alert_active;

    let mut alert_active = state.alert_active;
    let raised = if raise_down {
        alert_active = true;
        Some(AlertRaise {
            kind: AlertKind::Down,
            message: format!("Endpoint is DOWN for {} consecutive checks", new_failures),
            value: None,
        })
    } else if raise_latency {
        alert_active = true;
        let latency_ms = result.latency_ms.unwrap_or_default();
        Some(AlertRaise {
            kind: AlertKind::Latency,
            message: format!(
                "Latency {} ms exceeded threshold {} ms",
                latency_ms, latency_threshold
            ),
            value: Some(latency_ms),
        })
    } else {
        None
    };

    let cleared = state.alert_active
        && result.status == CheckStatus::Up
        && !latency_breach
        && new_failures == 0;
    if cleared {
        alert_active = false;
    }

    Transition {
        state: AlertState {
            consecutive_failures: new_failures,
            alert_active,
        },
        raised,
        cleared,
    }
}
