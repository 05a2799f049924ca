use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::data::{EndpointId, Measurement};
use crate::storage::{ObservationStore, StorageError};

pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// Uptime and latency over a trailing time window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStats {
    pub endpoint_id: EndpointId,
    /// Percentage of `up` checks, one decimal. `None` without checks.
    pub uptime_percent: Option<f64>,
    /// Mean of the recorded latencies, one decimal. Failed probes carry no
    /// latency and are left out.
    pub avg_latency_ms: Option<f64>,
    pub total_checks: usize,
    pub window_hours: u32,
}

impl WindowStats {
    /// Aggregate measurements already filtered to the window
    pub fn from_measurements(
        endpoint_id: EndpointId,
        window_hours: u32,
        measurements: &[Measurement],
    ) -> Self {
        let total_checks = measurements.len();
        if total_checks == 0 {
            return Self {
                endpoint_id,
                uptime_percent: None,
                avg_latency_ms: None,
                total_checks,
                window_hours,
            };
        }

        let up = measurements.iter().filter(|m| m.status.is_up()).count();

        let (latency_sum, latency_count) = measurements
            .iter()
            .filter_map(|m| m.latency_ms)
            .fold((0u128, 0usize), |(sum, n), ms| (sum + ms as u128, n + 1));
        let avg_latency_ms =
            (latency_count > 0).then(|| round1(latency_sum as f64 / latency_count as f64));

        Self {
            endpoint_id,
            uptime_percent: Some(round1(up as f64 * 100.0 / total_checks as f64)),
            avg_latency_ms,
            total_checks,
            window_hours,
        }
    }
}

/// Stats for the last `window_hours` hours, relative to `now`
pub fn window_stats_at(
    store: &ObservationStore,
    endpoint_id: EndpointId,
    window_hours: u32,
    now: DateTime<Utc>,
) -> Result<WindowStats, StorageError> {
    let cutoff = now
        .checked_sub_signed(Duration::hours(i64::from(window_hours)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let measurements = store.measurements_since(endpoint_id, cutoff)?;
    Ok(WindowStats::from_measurements(
        endpoint_id,
        window_hours,
        &measurements,
    ))
}

pub fn window_stats(
    store: &ObservationStore,
    endpoint_id: EndpointId,
    window_hours: u32,
) -> Result<WindowStats, StorageError> {
    window_stats_at(store, endpoint_id, window_hours, Utc::now())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CheckResult, CheckStatus, EndpointSpec};
    use crate::storage::ObservationSink;

    fn measurement(status: CheckStatus, latency_ms: Option<u64>) -> Measurement {
        Measurement {
            id: 0,
            endpoint_id: 1,
            latency_ms,
            status,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_window() {
        let stats = WindowStats::from_measurements(1, 24, &[]);
        assert_eq!(stats.total_checks, 0);
        assert_eq!(stats.uptime_percent, None);
        assert_eq!(stats.avg_latency_ms, None);
        assert_eq!(stats.window_hours, 24);
    }

    #[test]
    fn test_uptime_rounds_to_one_decimal() {
        let measurements = vec![
            measurement(CheckStatus::Up, Some(100)),
            measurement(CheckStatus::Up, Some(101)),
            measurement(CheckStatus::Down, None),
        ];
        let stats = WindowStats::from_measurements(1, 24, &measurements);
        assert_eq!(stats.total_checks, 3);
        assert_eq!(stats.uptime_percent, Some(66.7));
        // Null latency is excluded from the mean
        assert_eq!(stats.avg_latency_ms, Some(100.5));
    }

    #[test]
    fn test_down_with_latency_counts_toward_average() {
        let measurements = vec![
            measurement(CheckStatus::Down, Some(30)),
            measurement(CheckStatus::Up, Some(10)),
        ];
        let stats = WindowStats::from_measurements(1, 1, &measurements);
        assert_eq!(stats.uptime_percent, Some(50.0));
        assert_eq!(stats.avg_latency_ms, Some(20.0));
    }

    #[test]
    fn test_all_unreachable() {
        let measurements = vec![
            measurement(CheckStatus::Down, None),
            measurement(CheckStatus::Down, None),
        ];
        let stats = WindowStats::from_measurements(1, 24, &measurements);
        assert_eq!(stats.uptime_percent, Some(0.0));
        assert_eq!(stats.avg_latency_ms, None);
    }

    #[test]
    fn test_window_excludes_old_measurements() {
        let store = ObservationStore::new();
        let endpoint = store
            .create_endpoint(EndpointSpec::new("api", "http://example.com"))
            .unwrap();
        store
            .record_measurement(endpoint.id, &CheckResult::up(40))
            .unwrap();

        let stats = window_stats(&store, endpoint.id, 24).unwrap();
        assert_eq!(stats.total_checks, 1);
        assert_eq!(stats.uptime_percent, Some(100.0));

        // Evaluated two days later the single check falls outside the window
        let later = Utc::now() + Duration::hours(48);
        let stats = window_stats_at(&store, endpoint.id, 24, later).unwrap();
        assert_eq!(stats.total_checks, 0);
    }

    #[test]
    fn test_unknown_endpoint() {
        let store = ObservationStore::new();
        assert!(matches!(
            window_stats(&store, 9, 24),
            Err(StorageError::EndpointNotFound(9))
        ));
    }
}
