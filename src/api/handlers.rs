use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::alerts::AlertThresholds;
use crate::data::{
    AlertEvent, CheckStatus, Endpoint, EndpointId, EndpointSpec, EndpointUpdate, Measurement,
    DEFAULT_CONSECUTIVE_FAIL_THRESHOLD, DEFAULT_LATENCY_THRESHOLD_MS,
};
use crate::probe::Prober;
use crate::query::{
    endpoint_summaries, window_stats, EndpointSummary, WindowStats, DEFAULT_WINDOW_HOURS,
};
use crate::storage::{ObservationSink, ObservationStore, SinkError, StorageError};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 1000;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<ObservationStore>,
    pub prober: Prober,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub endpoints: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: state.store.endpoint_count(),
    })
}

// ============================================================================
// Endpoint Registry
// ============================================================================

#[derive(Serialize)]
pub struct EndpointsResponse {
    pub endpoints: Vec<Endpoint>,
}

pub async fn list_endpoints(State(state): State<Arc<AppState>>) -> Json<EndpointsResponse> {
    Json(EndpointsResponse {
        endpoints: state.store.list_endpoints(),
    })
}

#[derive(Deserialize)]
pub struct CreateEndpointRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub latency_threshold_ms: Option<u64>,
    #[serde(default)]
    pub consecutive_fail_threshold: Option<u32>,
}

pub async fn create_endpoint(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateEndpointRequest>,
) -> Result<Json<Endpoint>, ApiError> {
    let spec = EndpointSpec::new(request.name.trim(), request.url.trim())
        .with_latency_threshold(
            request
                .latency_threshold_ms
                .unwrap_or(DEFAULT_LATENCY_THRESHOLD_MS),
        )
        .with_fail_threshold(
            request
                .consecutive_fail_threshold
                .unwrap_or(DEFAULT_CONSECUTIVE_FAIL_THRESHOLD),
        );

    let endpoint = state.store.create_endpoint(spec)?;
    Ok(Json(endpoint))
}

#[derive(Deserialize)]
pub struct UpdateEndpointRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

pub async fn update_endpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EndpointId>,
    Json(request): Json<UpdateEndpointRequest>,
) -> Result<Json<Endpoint>, ApiError> {
    let update = EndpointUpdate {
        name: request.name.map(|n| n.trim().to_string()),
        url: request.url.map(|u| u.trim().to_string()),
    };

    let endpoint = state.store.update_endpoint(id, update)?;
    Ok(Json(endpoint))
}

pub async fn delete_endpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EndpointId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.delete_endpoint(id)?;
    Ok(Json(serde_json::json!({ "message": "Endpoint deleted" })))
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub endpoints: Vec<EndpointSummary>,
}

pub async fn endpoints_summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    Json(SummaryResponse {
        endpoints: endpoint_summaries(&state.store),
    })
}

// ============================================================================
// On-demand Probe
// ============================================================================

/// Probe an endpoint now and store the measurement. Alert state is untouched.
pub async fn measure_endpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EndpointId>,
) -> Result<Json<Measurement>, ApiError> {
    let endpoint = state
        .store
        .get_endpoint(id)
        .ok_or(StorageError::EndpointNotFound(id))?;

    let result = state.prober.probe(&endpoint.url).await;
    let measurement = state.store.record_measurement(id, &result)?;

    tracing::info!(
        endpoint_id = id,
        status = %measurement.status,
        latency_ms = ?measurement.latency_ms,
        "On-demand measurement recorded"
    );
    Ok(Json(measurement))
}

// ============================================================================
// Measurements & Stats
// ============================================================================

#[derive(Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct MeasurementsParams {
    pub endpoint_id: Option<EndpointId>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct StatsParams {
    pub hours: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT) as usize
}

#[derive(Serialize)]
pub struct MeasurementView {
    pub status: CheckStatus,
    pub latency_ms: Option<u64>,
    pub observed_at: DateTime<Utc>,
}

impl From<Measurement> for MeasurementView {
    fn from(m: Measurement) -> Self {
        Self {
            status: m.status,
            latency_ms: m.latency_ms,
            observed_at: m.observed_at,
        }
    }
}

#[derive(Serialize)]
pub struct EndpointMeasurementsResponse {
    pub endpoint_id: EndpointId,
    pub measurements: Vec<MeasurementView>,
}

pub async fn endpoint_measurements(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EndpointId>,
    Query(params): Query<LimitParams>,
) -> Result<Json<EndpointMeasurementsResponse>, ApiError> {
    let measurements = state
        .store
        .recent_measurements(id, clamp_limit(params.limit))?;

    Ok(Json(EndpointMeasurementsResponse {
        endpoint_id: id,
        measurements: measurements.into_iter().map(MeasurementView::from).collect(),
    }))
}

#[derive(Serialize)]
pub struct MeasurementsResponse {
    pub measurements: Vec<Measurement>,
}

/// Recent measurements across all endpoints, or one endpoint when
/// `endpoint_id` is given. An unknown endpoint yields an empty list.
pub async fn list_measurements(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MeasurementsParams>,
) -> Json<MeasurementsResponse> {
    let limit = clamp_limit(params.limit);
    let measurements = match params.endpoint_id {
        Some(id) => state
            .store
            .recent_measurements(id, limit)
            .unwrap_or_default(),
        None => state.store.all_recent_measurements(limit),
    };
    Json(MeasurementsResponse { measurements })
}

pub async fn endpoint_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EndpointId>,
    Query(params): Query<StatsParams>,
) -> Result<Json<WindowStats>, ApiError> {
    let hours = params.hours.unwrap_or(i64::from(DEFAULT_WINDOW_HOURS));
    if hours < 1 {
        return Err(ApiError::BadRequest("hours must be at least 1".to_string()));
    }
    let hours = u32::try_from(hours)
        .map_err(|_| ApiError::BadRequest(format!("hours out of range: {}", hours)))?;

    Ok(Json(window_stats(&state.store, id, hours)?))
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Deserialize)]
pub struct AlertConfigRequest {
    pub latency_threshold_ms: u64,
    pub consecutive_fail_threshold: u32,
}

#[derive(Serialize)]
pub struct AlertConfigResponse {
    pub latency_threshold_ms: u64,
    pub consecutive_fail_threshold: u32,
    pub consecutive_failures: u32,
    pub alert_active: bool,
    pub last_alert_at: Option<DateTime<Utc>>,
}

impl From<Endpoint> for AlertConfigResponse {
    fn from(e: Endpoint) -> Self {
        Self {
            latency_threshold_ms: e.latency_threshold_ms,
            consecutive_fail_threshold: e.consecutive_fail_threshold,
            consecutive_failures: e.consecutive_failures,
            alert_active: e.alert_active,
            last_alert_at: e.last_alert_at,
        }
    }
}

pub async fn get_alert_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EndpointId>,
) -> Result<Json<AlertConfigResponse>, ApiError> {
    let endpoint = state
        .store
        .get_endpoint(id)
        .ok_or(StorageError::EndpointNotFound(id))?;
    Ok(Json(endpoint.into()))
}

pub async fn update_alert_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EndpointId>,
    Json(request): Json<AlertConfigRequest>,
) -> Result<Json<AlertConfigResponse>, ApiError> {
    let thresholds = AlertThresholds {
        latency_threshold_ms: request.latency_threshold_ms,
        consecutive_fail_threshold: request.consecutive_fail_threshold,
    };
    let endpoint = state.store.update_thresholds(id, thresholds)?;
    Ok(Json(endpoint.into()))
}

#[derive(Serialize)]
pub struct EndpointAlertsResponse {
    pub endpoint_id: EndpointId,
    pub alerts: Vec<AlertEvent>,
}

pub async fn endpoint_alerts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EndpointId>,
    Query(params): Query<LimitParams>,
) -> Result<Json<EndpointAlertsResponse>, ApiError> {
    let alerts = state.store.recent_alerts(id, clamp_limit(params.limit))?;
    Ok(Json(EndpointAlertsResponse {
        endpoint_id: id,
        alerts,
    }))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::EndpointNotFound(_) => {
                ApiError::NotFound("Endpoint not found".to_string())
            }
            StorageError::InvalidEndpoint(e) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<SinkError> for ApiError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::EndpointNotFound(_) => {
                ApiError::NotFound("Endpoint not found".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(200)), 200);
        assert_eq!(clamp_limit(Some(5000)), 1000);
    }

    #[test]
    fn test_storage_error_mapping() {
        let err: ApiError = StorageError::EndpointNotFound(3).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError =
            StorageError::InvalidEndpoint(crate::data::EndpointError::EmptyName).into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = SinkError::Unavailable("down".to_string()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
