//! Background sweep scheduler

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::Notify;
use tokio::time;

use super::config::SchedulerConfig;
use crate::alerts::transition;
use crate::data::{CheckStatus, Endpoint, EndpointId};
use crate::probe::Prober;
use crate::storage::{CheckCommit, EndpointRegistry, ObservationSink, SinkError};

/// Probes every registered endpoint at a fixed interval and records the
/// outcome through the observation sink
pub struct SweepScheduler {
    registry: Arc<dyn EndpointRegistry>,
    sink: Arc<dyn ObservationSink>,
    prober: Prober,
    config: SchedulerConfig,
    running: AtomicBool,
    shutdown: Notify,
}

impl SweepScheduler {
    pub fn new(
        registry: Arc<dyn EndpointRegistry>,
        sink: Arc<dyn ObservationSink>,
        prober: Prober,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            prober,
            config,
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// Start the sweep loop. The first sweep runs immediately; each later
    /// sweep starts one poll interval after the previous one finished.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!(
                poll_interval_secs = self.config.poll_interval.as_secs_f64(),
                probe_timeout_secs = self.config.probe_timeout.as_secs_f64(),
                max_concurrent_probes = self.config.max_concurrent_probes,
                "Sweep scheduler started"
            );

            while self.running.load(Ordering::SeqCst) {
                match self.run_sweep().await {
                    Ok(report) => report.log(),
                    Err(e) => {
                        tracing::error!(error = %e, "Sweep failed, retrying next interval");
                    }
                }

                tokio::select! {
                    _ = time::sleep(self.config.poll_interval) => {}
                    _ = self.shutdown.notified() => {}
                }
            }

            tracing::info!("Sweep scheduler stopped");
        })
    }

    /// Stop the loop. An in-progress sweep is allowed to finish.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Probe all endpoints once and persist the results.
    ///
    /// Endpoints are checked concurrently up to `max_concurrent_probes`; the
    /// call returns when every endpoint has been handled.
    pub async fn run_sweep(&self) -> Result<SweepReport, SweepError> {
        let started = Instant::now();
        let endpoints = self
            .registry
            .load_endpoints()
            .map_err(SweepError::LoadEndpoints)?;

        if endpoints.is_empty() {
            tracing::debug!("No endpoints registered");
        }

        let mut report = SweepReport {
            endpoints: endpoints.len(),
            ..Default::default()
        };

        let outcomes: Vec<EndpointOutcome> = stream::iter(endpoints)
            .map(|endpoint| self.check_endpoint(endpoint))
            .buffer_unordered(self.config.max_concurrent_probes.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        report.elapsed = started.elapsed();

        Ok(report)
    }

    /// Probe one endpoint, run the state machine and commit
    async fn check_endpoint(&self, endpoint: Endpoint) -> EndpointOutcome {
        let result = self.prober.probe(&endpoint.url).await;
        let next = transition(endpoint.alert_state(), &result, &endpoint.thresholds());
        let raised = next.raised.is_some();
        let cleared = next.cleared;

        let commit = CheckCommit {
            endpoint_id: endpoint.id,
            expected_version: endpoint.state_version,
            result,
            transition: next,
        };

        match self.sink.commit_check(commit) {
            Ok(committed) => {
                if let Some(event) = &committed.event {
                    tracing::warn!(
                        endpoint_id = endpoint.id,
                        name = %endpoint.name,
                        alert_type = %event.kind,
                        "Alert raised: {}",
                        event.message
                    );
                }
                if cleared {
                    tracing::info!(
                        endpoint_id = endpoint.id,
                        name = %endpoint.name,
                        "Alert cleared"
                    );
                }
                EndpointOutcome::Committed {
                    status: result.status,
                    raised,
                    cleared,
                }
            }
            // Edited or deleted mid-sweep; the next sweep checks it again
            Err(e @ SinkError::Conflict { .. }) => {
                tracing::warn!(
                    endpoint_id = endpoint.id,
                    name = %endpoint.name,
                    error = %e,
                    "Dropped stale check"
                );
                EndpointOutcome::PersistenceFailed {
                    endpoint_id: endpoint.id,
                }
            }
            Err(e) => {
                tracing::error!(
                    endpoint_id = endpoint.id,
                    name = %endpoint.name,
                    error = %e,
                    "Failed to persist check"
                );
                EndpointOutcome::PersistenceFailed {
                    endpoint_id: endpoint.id,
                }
            }
        }
    }
}

/// What happened to one endpoint during a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointOutcome {
    Committed {
        status: CheckStatus,
        raised: bool,
        cleared: bool,
    },
    PersistenceFailed {
        endpoint_id: EndpointId,
    },
}

/// Summary of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Endpoints loaded from the registry
    pub endpoints: usize,
    pub up: usize,
    pub down: usize,
    pub alerts_raised: usize,
    pub alerts_cleared: usize,
    /// Endpoints whose results could not be persisted
    pub failed_endpoints: Vec<EndpointId>,
    pub elapsed: Duration,
}

impl SweepReport {
    fn record(&mut self, outcome: EndpointOutcome) {
        match outcome {
            EndpointOutcome::Committed {
                status,
                raised,
                cleared,
            } => {
                match status {
                    CheckStatus::Up => self.up += 1,
                    CheckStatus::Down => self.down += 1,
                }
                self.alerts_raised += raised as usize;
                self.alerts_cleared += cleared as usize;
            }
            EndpointOutcome::PersistenceFailed { endpoint_id } => {
                self.failed_endpoints.push(endpoint_id);
            }
        }
    }

    /// Endpoints whose check was committed
    pub fn committed(&self) -> usize {
        self.up + self.down
    }

    fn log(&self) {
        tracing::info!(
            endpoints = self.endpoints,
            up = self.up,
            down = self.down,
            alerts_raised = self.alerts_raised,
            alerts_cleared = self.alerts_cleared,
            persistence_failures = self.failed_endpoints.len(),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Sweep completed"
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Failed to load endpoints: {0}")]
    LoadEndpoints(SinkError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AlertKind, CheckResult, EndpointSpec, Measurement};
    use crate::storage::{CommittedCheck, ObservationStore};
    use crate::testing::{closed_port_url, spawn_target};

    fn config() -> SchedulerConfig {
        SchedulerConfig::default()
            .with_probe_timeout(Duration::from_millis(500))
            .with_poll_interval(Duration::from_millis(50))
    }

    fn scheduler_for(store: &Arc<ObservationStore>, config: SchedulerConfig) -> SweepScheduler {
        let prober = Prober::new(config.probe_timeout).unwrap();
        SweepScheduler::new(store.clone(), store.clone(), prober, config)
    }

    /// Sink that rejects commits for one endpoint
    struct FailingSink {
        inner: Arc<ObservationStore>,
        broken: EndpointId,
    }

    impl ObservationSink for FailingSink {
        fn commit_check(&self, commit: CheckCommit) -> Result<CommittedCheck, SinkError> {
            if commit.endpoint_id == self.broken {
                return Err(SinkError::Unavailable("disk full".to_string()));
            }
            self.inner.commit_check(commit)
        }

        fn record_measurement(
            &self,
            endpoint_id: EndpointId,
            result: &CheckResult,
        ) -> Result<Measurement, SinkError> {
            self.inner.record_measurement(endpoint_id, result)
        }
    }

    struct UnreachableRegistry;

    impl EndpointRegistry for UnreachableRegistry {
        fn load_endpoints(&self) -> Result<Vec<Endpoint>, SinkError> {
            Err(SinkError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_sweep_records_measurements() {
        let target = spawn_target().await;
        let store = Arc::new(ObservationStore::new());
        let up = store
            .create_endpoint(EndpointSpec::new("up", target.url("/ok")))
            .unwrap();
        let down = store
            .create_endpoint(EndpointSpec::new("down", target.url("/missing")))
            .unwrap();

        let report = scheduler_for(&store, config()).run_sweep().await.unwrap();
        assert_eq!(report.endpoints, 2);
        assert_eq!(report.up, 1);
        assert_eq!(report.down, 1);
        assert!(report.failed_endpoints.is_empty());

        let m = store.latest_measurement(up.id).unwrap();
        assert_eq!(m.status, CheckStatus::Up);
        assert!(m.latency_ms.is_some());

        let m = store.latest_measurement(down.id).unwrap();
        assert_eq!(m.status, CheckStatus::Down);
        assert_eq!(store.get_endpoint(down.id).unwrap().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_sustained_outage_raises_once() {
        let store = Arc::new(ObservationStore::new());
        let endpoint = store
            .create_endpoint(EndpointSpec::new("gone", closed_port_url()).with_fail_threshold(3))
            .unwrap();
        let scheduler = scheduler_for(&store, config());

        let mut raised = Vec::new();
        for _ in 0..5 {
            raised.push(scheduler.run_sweep().await.unwrap().alerts_raised);
        }
        assert_eq!(raised, vec![0, 0, 1, 0, 0]);

        let alerts = store.recent_alerts(endpoint.id, 10).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Down);
        assert_eq!(alerts[0].message, "Endpoint is DOWN for 3 consecutive checks");

        let endpoint = store.get_endpoint(endpoint.id).unwrap();
        assert_eq!(endpoint.consecutive_failures, 5);
        assert!(endpoint.alert_active);
        assert_eq!(endpoint.last_alert_at, Some(alerts[0].created_at));
        assert!(store
            .recent_measurements(endpoint.id, 10)
            .unwrap()
            .iter()
            .all(|m| m.latency_ms.is_none()));
    }

    #[tokio::test]
    async fn test_recovery_clears_alert() {
        let target = spawn_target().await;
        let store = Arc::new(ObservationStore::new());
        let endpoint = store
            .create_endpoint(EndpointSpec::new("flaky", target.url("/error")).with_fail_threshold(1))
            .unwrap();
        let scheduler = scheduler_for(&store, config());

        let report = scheduler.run_sweep().await.unwrap();
        assert_eq!(report.alerts_raised, 1);
        assert!(store.get_endpoint(endpoint.id).unwrap().alert_active);

        store
            .update_endpoint(
                endpoint.id,
                crate::data::EndpointUpdate {
                    name: None,
                    url: Some(target.url("/ok")),
                },
            )
            .unwrap();

        let report = scheduler.run_sweep().await.unwrap();
        assert_eq!(report.alerts_cleared, 1);
        assert_eq!(report.alerts_raised, 0);

        let endpoint = store.get_endpoint(endpoint.id).unwrap();
        assert!(!endpoint.alert_active);
        assert_eq!(endpoint.consecutive_failures, 0);
        assert_eq!(store.recent_alerts(endpoint.id, 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_isolated() {
        let target = spawn_target().await;
        let store = Arc::new(ObservationStore::new());
        let broken = store
            .create_endpoint(EndpointSpec::new("broken", target.url("/ok")))
            .unwrap();
        let healthy = store
            .create_endpoint(EndpointSpec::new("healthy", target.url("/ok")))
            .unwrap();

        let sink = Arc::new(FailingSink {
            inner: Arc::clone(&store),
            broken: broken.id,
        });
        let cfg = config();
        let scheduler = SweepScheduler::new(
            store.clone(),
            sink,
            Prober::new(cfg.probe_timeout).unwrap(),
            cfg,
        );

        let report = scheduler.run_sweep().await.unwrap();
        assert_eq!(report.failed_endpoints, vec![broken.id]);
        assert_eq!(report.committed(), 1);

        assert!(store.latest_measurement(broken.id).is_none());
        assert_eq!(store.get_endpoint(broken.id).unwrap().state_version, 0);
        assert!(store.latest_measurement(healthy.id).is_some());
    }

    #[tokio::test]
    async fn test_registry_failure_skips_sweep() {
        let store = Arc::new(ObservationStore::new());
        let cfg = config();
        let scheduler = SweepScheduler::new(
            Arc::new(UnreachableRegistry),
            store.clone(),
            Prober::new(cfg.probe_timeout).unwrap(),
            cfg,
        );

        let err = scheduler.run_sweep().await.unwrap_err();
        assert!(matches!(
            err,
            SweepError::LoadEndpoints(SinkError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_endpoints_do_not_serialize_sweep() {
        let target = spawn_target().await;
        let store = Arc::new(ObservationStore::new());
        for i in 0..4 {
            store
                .create_endpoint(EndpointSpec::new(format!("slow-{}", i), target.url("/slow")))
                .unwrap();
        }
        store
            .create_endpoint(EndpointSpec::new("fast", target.url("/ok")))
            .unwrap();

        let cfg = config().with_max_concurrent_probes(8);
        let scheduler = scheduler_for(&store, cfg);

        let report = scheduler.run_sweep().await.unwrap();
        assert_eq!(report.down, 4);
        assert_eq!(report.up, 1);
        // Sequential probing would need at least 4 x 500ms
        assert!(
            report.elapsed < Duration::from_millis(1500),
            "sweep took {:?}",
            report.elapsed
        );
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let target = spawn_target().await;
        let store = Arc::new(ObservationStore::new());
        let endpoint = store
            .create_endpoint(EndpointSpec::new("api", target.url("/ok")))
            .unwrap();

        let scheduler = Arc::new(scheduler_for(&store, config()));
        let handle = Arc::clone(&scheduler).start();
        assert!(scheduler.is_running());

        time::sleep(Duration::from_millis(300)).await;
        scheduler.stop();
        time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler should stop promptly")
            .unwrap();

        let count = store.recent_measurements(endpoint.id, 100).unwrap().len();
        assert!(count >= 2, "expected repeated sweeps, got {}", count);
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_sleep() {
        let store = Arc::new(ObservationStore::new());
        let scheduler = Arc::new(scheduler_for(
            &store,
            config().with_poll_interval(Duration::from_secs(3600)),
        ));

        let handle = Arc::clone(&scheduler).start();
        time::sleep(Duration::from_millis(50)).await;
        scheduler.stop();

        time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("stop should wake the sleeping scheduler")
            .unwrap();
    }
}
