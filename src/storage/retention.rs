use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use super::engine::{ObservationStore, PruneStats};
use crate::config::{env_or, require_positive, ConfigError};

/// Keep a week of history by default, well beyond the default stats window
pub const DEFAULT_RETENTION_HOURS: u64 = 168;
pub const DEFAULT_RETENTION_CHECK_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionConfig {
    /// Measurements and alert events older than this are dropped
    pub max_age: Duration,
    pub check_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(DEFAULT_RETENTION_HOURS * 3600),
            check_interval: DEFAULT_RETENTION_CHECK_INTERVAL,
        }
    }
}

impl RetentionConfig {
    /// NETHEALTH_RETENTION_HOURS=168
    pub fn from_env() -> Result<Self, ConfigError> {
        let hours: u64 = env_or("NETHEALTH_RETENTION_HOURS", DEFAULT_RETENTION_HOURS)?;
        require_positive("NETHEALTH_RETENTION_HOURS", hours)?;

        Ok(Self {
            max_age: Duration::from_secs(hours.saturating_mul(3600)),
            ..Default::default()
        })
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }
}

/// Retention worker that periodically drops old observations
pub struct RetentionWorker {
    store: Arc<ObservationStore>,
    config: RetentionConfig,
    running: Arc<AtomicBool>,
}

impl RetentionWorker {
    pub fn new(store: Arc<ObservationStore>, config: RetentionConfig) -> Self {
        Self {
            store,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background worker. The first pass runs immediately so a
    /// restored snapshot is trimmed at start-up.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!(
                max_age_hours = self.config.max_age.as_secs() / 3600,
                "Retention worker started with interval {:?}",
                self.config.check_interval
            );

            let mut interval = time::interval(self.config.check_interval);

            while self.running.load(Ordering::SeqCst) {
                interval.tick().await;

                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                self.prune_now();
            }

            tracing::info!("Retention worker stopped");
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn prune_now(&self) -> PruneStats {
        self.prune_at(Utc::now())
    }

    /// Drop everything older than `now - max_age`
    pub fn prune_at(&self, now: DateTime<Utc>) -> PruneStats {
        let cutoff = match chrono::Duration::from_std(self.config.max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
        {
            Some(cutoff) => cutoff,
            // Older than anything representable: nothing to drop
            None => return PruneStats::default(),
        };

        let stats = self.store.prune_before(cutoff);
        if !stats.is_empty() {
            tracing::info!(
                measurements = stats.measurements,
                alerts = stats.alerts,
                "Retention pass removed old observations"
            );
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CheckStatus, Endpoint, Measurement};
    use crate::query::{window_stats_at, DEFAULT_WINDOW_HOURS};
    use crate::storage::{EndpointRecord, StoreSnapshot};

    fn store_with_history(now: DateTime<Utc>, ages_hours: &[i64]) -> Arc<ObservationStore> {
        let endpoint = Endpoint {
            id: 1,
            name: "api".to_string(),
            url: "http://api.example".to_string(),
            latency_threshold_ms: 1000,
            consecutive_fail_threshold: 3,
            consecutive_failures: 0,
            alert_active: false,
            last_alert_at: None,
            created_at: now - chrono::Duration::days(30),
            state_version: 0,
        };
        let measurements = ages_hours
            .iter()
            .enumerate()
            .map(|(i, h)| Measurement {
                id: i as u64 + 1,
                endpoint_id: 1,
                latency_ms: Some(100 * (i as u64 + 1)),
                status: if i % 2 == 0 {
                    CheckStatus::Up
                } else {
                    CheckStatus::Down
                },
                observed_at: now - chrono::Duration::hours(*h),
            })
            .collect();

        let store = Arc::new(ObservationStore::new());
        store.restore(StoreSnapshot {
            records: vec![EndpointRecord {
                endpoint,
                measurements,
                alerts: Vec::new(),
            }],
            ..Default::default()
        });
        store
    }

    #[test]
    fn test_prune_drops_old_rows_and_keeps_window_stats() {
        let now = Utc::now();
        let store = store_with_history(now, &[200, 100, 23, 12, 1]);
        let worker = RetentionWorker::new(
            Arc::clone(&store),
            RetentionConfig::default().with_max_age(Duration::from_secs(24 * 3600)),
        );

        let before = window_stats_at(&store, 1, DEFAULT_WINDOW_HOURS, now).unwrap();
        assert_eq!(before.total_checks, 3);

        let stats = worker.prune_at(now);
        assert_eq!(stats.measurements, 2);
        assert_eq!(store.recent_measurements(1, 100).unwrap().len(), 3);

        let after = window_stats_at(&store, 1, DEFAULT_WINDOW_HOURS, now).unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn test_default_retention_covers_stats_window() {
        let config = RetentionConfig::default();
        assert!(config.max_age >= Duration::from_secs(u64::from(DEFAULT_WINDOW_HOURS) * 3600));
    }

    #[test]
    fn test_unrepresentable_age_prunes_nothing() {
        let now = Utc::now();
        let store = store_with_history(now, &[5000, 1]);
        let worker = RetentionWorker::new(
            Arc::clone(&store),
            RetentionConfig::default().with_max_age(Duration::from_secs(u64::MAX)),
        );

        assert!(worker.prune_at(now).is_empty());
        assert_eq!(store.recent_measurements(1, 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_worker_prunes_on_start() {
        let now = Utc::now();
        let store = store_with_history(now, &[48, 1]);
        let worker = Arc::new(RetentionWorker::new(
            Arc::clone(&store),
            RetentionConfig::default()
                .with_max_age(Duration::from_secs(24 * 3600))
                .with_check_interval(Duration::from_millis(20)),
        ));

        let handle = Arc::clone(&worker).start();
        assert!(worker.is_running());
        time::sleep(Duration::from_millis(100)).await;
        worker.stop();
        handle.await.unwrap();

        assert_eq!(store.recent_measurements(1, 10).unwrap().len(), 1);
    }
}
