use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::{CheckStatus, EndpointId};
use crate::storage::ObservationStore;

/// One dashboard row: an endpoint with its latest measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointSummary {
    pub id: EndpointId,
    pub name: String,
    pub url: String,
    /// Whether an alert is currently active
    pub alert: bool,
    pub last_status: Option<CheckStatus>,
    pub last_latency_ms: Option<u64>,
    pub last_observed_at: Option<DateTime<Utc>>,
}

/// Summaries for every endpoint, ordered by id
pub fn endpoint_summaries(store: &ObservationStore) -> Vec<EndpointSummary> {
    store
        .list_endpoints()
        .into_iter()
        .map(|endpoint| {
            let latest = store.latest_measurement(endpoint.id);
            EndpointSummary {
                id: endpoint.id,
                name: endpoint.name,
                url: endpoint.url,
                alert: endpoint.alert_active,
                last_status: latest.as_ref().map(|m| m.status),
                last_latency_ms: latest.as_ref().and_then(|m| m.latency_ms),
                last_observed_at: latest.map(|m| m.observed_at),
            }
        })
        .collect()
}
