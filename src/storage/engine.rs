use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::sink::{CheckCommit, CommittedCheck, EndpointRegistry, ObservationSink, SinkError};
use crate::alerts::AlertThresholds;
use crate::data::{
    AlertEvent, CheckResult, Endpoint, EndpointError, EndpointId, EndpointSpec, EndpointUpdate,
    Measurement,
};

/// Everything stored for one endpoint. Kept behind a single map entry so a
/// check commit touches all three under one lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub endpoint: Endpoint,
    /// Oldest first
    pub measurements: Vec<Measurement>,
    /// Oldest first
    pub alerts: Vec<AlertEvent>,
}

/// Serializable copy of the whole store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub records: Vec<EndpointRecord>,
    pub next_endpoint_id: u64,
    pub next_measurement_id: u64,
    pub next_alert_id: u64,
}

/// In-memory endpoint registry and observation store
pub struct ObservationStore {
    records: DashMap<EndpointId, EndpointRecord>,
    next_endpoint_id: AtomicU64,
    next_measurement_id: AtomicU64,
    next_alert_id: AtomicU64,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_endpoint_id: AtomicU64::new(1),
            next_measurement_id: AtomicU64::new(1),
            next_alert_id: AtomicU64::new(1),
        }
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Register a new endpoint with a fresh alert state
    pub fn create_endpoint(&self, spec: EndpointSpec) -> Result<Endpoint, StorageError> {
        spec.validate()?;

        let id = self.next_endpoint_id.fetch_add(1, Ordering::SeqCst);
        let endpoint = Endpoint {
            id,
            name: spec.name,
            url: spec.url,
            latency_threshold_ms: spec.thresholds.latency_threshold_ms,
            consecutive_fail_threshold: spec.thresholds.consecutive_fail_threshold,
            consecutive_failures: 0,
            alert_active: false,
            last_alert_at: None,
            created_at: Utc::now(),
            state_version: 0,
        };

        self.records.insert(
            id,
            EndpointRecord {
                endpoint: endpoint.clone(),
                measurements: Vec::new(),
                alerts: Vec::new(),
            },
        );

        tracing::info!(endpoint_id = id, url = %endpoint.url, "Endpoint registered");
        Ok(endpoint)
    }

    pub fn get_endpoint(&self, id: EndpointId) -> Option<Endpoint> {
        self.records.get(&id).map(|r| r.endpoint.clone())
    }

    /// All endpoints ordered by id
    pub fn list_endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> =
            self.records.iter().map(|r| r.endpoint.clone()).collect();
        endpoints.sort_by_key(|e| e.id);
        endpoints
    }

    pub fn endpoint_count(&self) -> usize {
        self.records.len()
    }

    /// Change display fields. Alert state is left alone.
    pub fn update_endpoint(
        &self,
        id: EndpointId,
        update: EndpointUpdate,
    ) -> Result<Endpoint, StorageError> {
        update.validate()?;

        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(StorageError::EndpointNotFound(id))?;

        if let Some(name) = update.name {
            record.endpoint.name = name;
        }
        if let Some(url) = update.url {
            record.endpoint.url = url;
        }

        Ok(record.endpoint.clone())
    }

    /// Replace the alert thresholds of an endpoint
    pub fn update_thresholds(
        &self,
        id: EndpointId,
        thresholds: AlertThresholds,
    ) -> Result<Endpoint, StorageError> {
        thresholds.validate()?;

        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(StorageError::EndpointNotFound(id))?;

        record.endpoint.latency_threshold_ms = thresholds.latency_threshold_ms;
        record.endpoint.consecutive_fail_threshold = thresholds.consecutive_fail_threshold;
        // A check already in flight was evaluated against the old thresholds;
        // bumping the version makes its commit conflict instead of landing.
        record.endpoint.state_version += 1;

        Ok(record.endpoint.clone())
    }

    /// Remove an endpoint together with its measurements and alerts
    pub fn delete_endpoint(&self, id: EndpointId) -> Result<(), StorageError> {
        if self.records.remove(&id).is_none() {
            return Err(StorageError::EndpointNotFound(id));
        }
        tracing::info!(endpoint_id = id, "Endpoint deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Observations
    // ------------------------------------------------------------------

    /// Most recent measurements of one endpoint, newest first
    pub fn recent_measurements(
        &self,
        id: EndpointId,
        limit: usize,
    ) -> Result<Vec<Measurement>, StorageError> {
        let record = self
            .records
            .get(&id)
            .ok_or(StorageError::EndpointNotFound(id))?;

        Ok(record
            .measurements
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    /// Most recent measurements across all endpoints, newest first
    pub fn all_recent_measurements(&self, limit: usize) -> Vec<Measurement> {
        let mut measurements: Vec<Measurement> = self
            .records
            .iter()
            .flat_map(|r| {
                r.measurements
                    .iter()
                    .rev()
                    .take(limit)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        measurements.sort_by(|a, b| {
            b.observed_at
                .cmp(&a.observed_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        measurements.truncate(limit);
        measurements
    }

    pub fn latest_measurement(&self, id: EndpointId) -> Option<Measurement> {
        self.records
            .get(&id)
            .and_then(|r| r.measurements.last().cloned())
    }

    /// Measurements observed at or after `cutoff`, newest first
    pub fn measurements_since(
        &self,
        id: EndpointId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, StorageError> {
        let record = self
            .records
            .get(&id)
            .ok_or(StorageError::EndpointNotFound(id))?;

        Ok(record
            .measurements
            .iter()
            .rev()
            .filter(|m| m.observed_at >= cutoff)
            .cloned()
            .collect())
    }

    /// Most recent alert events of one endpoint, newest first
    pub fn recent_alerts(
        &self,
        id: EndpointId,
        limit: usize,
    ) -> Result<Vec<AlertEvent>, StorageError> {
        let record = self
            .records
            .get(&id)
            .ok_or(StorageError::EndpointNotFound(id))?;

        Ok(record.alerts.iter().rev().take(limit).cloned().collect())
    }

    /// Drop measurements and alert events recorded before `cutoff`.
    /// Endpoints and their alert state are kept.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> PruneStats {
        let mut stats = PruneStats::default();

        for mut record in self.records.iter_mut() {
            let measurements = record.measurements.len();
            record.measurements.retain(|m| m.observed_at >= cutoff);
            stats.measurements += measurements - record.measurements.len();

            let alerts = record.alerts.len();
            record.alerts.retain(|a| a.created_at >= cutoff);
            stats.alerts += alerts - record.alerts.len();
        }

        stats
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Copy the store for persistence. Each record is copied atomically.
    pub fn export(&self) -> StoreSnapshot {
        let mut records: Vec<EndpointRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.endpoint.id);

        StoreSnapshot {
            records,
            next_endpoint_id: self.next_endpoint_id.load(Ordering::SeqCst),
            next_measurement_id: self.next_measurement_id.load(Ordering::SeqCst),
            next_alert_id: self.next_alert_id.load(Ordering::SeqCst),
        }
    }

    /// Replace the store contents with a snapshot
    pub fn restore(&self, snapshot: StoreSnapshot) {
        self.records.clear();

        let mut max_endpoint_id = 0;
        let mut max_measurement_id = 0;
        let mut max_alert_id = 0;

        for record in snapshot.records {
            max_endpoint_id = max_endpoint_id.max(record.endpoint.id);
            if let Some(id) = record.measurements.iter().map(|m| m.id).max() {
                max_measurement_id = max_measurement_id.max(id);
            }
            if let Some(id) = record.alerts.iter().map(|a| a.id).max() {
                max_alert_id = max_alert_id.max(id);
            }
            self.records.insert(record.endpoint.id, record);
        }

        // Never hand out an id that already exists
        self.next_endpoint_id.store(
            snapshot.next_endpoint_id.max(max_endpoint_id + 1),
            Ordering::SeqCst,
        );
        self.next_measurement_id.store(
            snapshot.next_measurement_id.max(max_measurement_id + 1),
            Ordering::SeqCst,
        );
        self.next_alert_id.store(
            snapshot.next_alert_id.max(max_alert_id + 1),
            Ordering::SeqCst,
        );
    }

    fn next_measurement(
        &self,
        endpoint_id: EndpointId,
        result: &CheckResult,
        observed_at: DateTime<Utc>,
    ) -> Measurement {
        Measurement {
            id: self.next_measurement_id.fetch_add(1, Ordering::SeqCst),
            endpoint_id,
            latency_ms: result.latency_ms,
            status: result.status,
            observed_at,
        }
    }
}

/// Rows removed by a retention pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub measurements: usize,
    pub alerts: usize,
}

impl PruneStats {
    pub fn is_empty(&self) -> bool {
        self.measurements == 0 && self.alerts == 0
    }
}

impl Default for ObservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistry for ObservationStore {
    fn load_endpoints(&self) -> Result<Vec<Endpoint>, SinkError> {
        Ok(self.list_endpoints())
    }
}

impl ObservationSink for ObservationStore {
    fn commit_check(&self, commit: CheckCommit) -> Result<CommittedCheck, SinkError> {
        let mut guard = self
            .records
            .get_mut(&commit.endpoint_id)
            .ok_or(SinkError::EndpointNotFound(commit.endpoint_id))?;
        let record = &mut *guard;

        if record.endpoint.state_version != commit.expected_version {
            return Err(SinkError::Conflict {
                endpoint_id: commit.endpoint_id,
                expected: commit.expected_version,
                actual: record.endpoint.state_version,
            });
        }

        let now = Utc::now();
        let measurement = self.next_measurement(commit.endpoint_id, &commit.result, now);

        let event = commit.transition.raised.map(|raise| AlertEvent {
            id: self.next_alert_id.fetch_add(1, Ordering::SeqCst),
            endpoint_id: commit.endpoint_id,
            kind: raise.kind,
            message: raise.message,
            value: raise.value,
            created_at: now,
        });

        let endpoint = &mut record.endpoint;
        endpoint.consecutive_failures = commit.transition.state.consecutive_failures;
        endpoint.alert_active = commit.transition.state.alert_active;
        if event.is_some() {
            endpoint.last_alert_at = Some(now);
        }
        endpoint.state_version += 1;
        let state_version = endpoint.state_version;

        record.measurements.push(measurement.clone());
        if let Some(event) = &event {
            record.alerts.push(event.clone());
        }

        Ok(CommittedCheck {
            measurement,
            event,
            state_version,
        })
    }

    fn record_measurement(
        &self,
        endpoint_id: EndpointId,
        result: &CheckResult,
    ) -> Result<Measurement, SinkError> {
        let mut record = self
            .records
            .get_mut(&endpoint_id)
            .ok_or(SinkError::EndpointNotFound(endpoint_id))?;

        let measurement = self.next_measurement(endpoint_id, result, Utc::now());
        record.measurements.push(measurement.clone());
        Ok(measurement)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(EndpointId),

    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),
}
