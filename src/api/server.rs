use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_endpoint, delete_endpoint, endpoint_alerts, endpoint_measurements, endpoint_stats,
    endpoints_summary, get_alert_config, health_check, list_endpoints, list_measurements,
    measure_endpoint, update_alert_config, update_endpoint, AppState,
};
use crate::probe::Prober;
use crate::scheduler::{SchedulerConfig, SweepScheduler};
use crate::storage::{
    ObservationStore, PersistenceConfig, RetentionConfig, RetentionWorker, SnapshotManager,
    SnapshotWorker,
};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub scheduler: SchedulerConfig,
    pub persistence: PersistenceConfig,
    pub retention: RetentionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            scheduler: SchedulerConfig::default(),
            persistence: PersistenceConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Endpoint registry
        .route("/api/endpoints", get(list_endpoints).post(create_endpoint))
        .route("/api/endpoints/summary", get(endpoints_summary))
        .route(
            "/api/endpoints/:id",
            put(update_endpoint).delete(delete_endpoint),
        )
        // Probing and history
        .route("/api/endpoints/:id/measure", post(measure_endpoint))
        .route("/api/endpoints/:id/measurements", get(endpoint_measurements))
        .route("/api/endpoints/:id/stats", get(endpoint_stats))
        .route("/api/measurements", get(list_measurements))
        // Alerts
        .route(
            "/api/endpoints/:id/alert-config",
            get(get_alert_config).put(update_alert_config),
        )
        .route("/api/endpoints/:id/alerts", get(endpoint_alerts))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server together with the sweep scheduler, snapshot and
/// retention workers
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.scheduler.validate()?;

    let store = Arc::new(ObservationStore::new());

    // A snapshot that exists but cannot be read stops start-up
    let snapshots = Arc::new(SnapshotManager::new(config.persistence.clone())?);
    match snapshots.restore_latest(&store)? {
        Some(metadata) => tracing::info!(
            snapshot_id = %metadata.id,
            endpoints = metadata.endpoints,
            measurements = metadata.measurements,
            alerts = metadata.alerts,
            "Restored state from snapshot"
        ),
        None => tracing::info!("No snapshot found, starting with an empty store"),
    }

    let prober = Prober::new(config.scheduler.probe_timeout)?;

    let state = Arc::new(AppState {
        store: Arc::clone(&store),
        prober: prober.clone(),
    });

    // Start background workers
    let scheduler = Arc::new(SweepScheduler::new(
        store.clone(),
        store.clone(),
        prober,
        config.scheduler.clone(),
    ));
    let scheduler_handle = Arc::clone(&scheduler).start();

    let snapshot_worker = Arc::new(SnapshotWorker::new(
        Arc::clone(&store),
        snapshots,
        config.persistence.snapshot_interval,
    ));
    let snapshot_handle = Arc::clone(&snapshot_worker).start();

    let retention_worker = Arc::new(RetentionWorker::new(
        Arc::clone(&store),
        config.retention.clone(),
    ));
    let retention_handle = Arc::clone(&retention_worker).start();

    // Build router
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting nethealth server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(
            Arc::clone(&scheduler),
            Arc::clone(&snapshot_worker),
            Arc::clone(&retention_worker),
        ))
        .await?;

    // Let an in-progress sweep commit before the final snapshot
    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Sweep scheduler task failed");
    }
    snapshot_handle.abort();
    retention_handle.abort();

    match snapshot_worker.snapshot_now() {
        Ok(metadata) => tracing::info!(snapshot_id = %metadata.id, "Final snapshot written"),
        Err(e) => tracing::error!(error = %e, "Final snapshot failed"),
    }

    tracing::info!("nethealth server stopped");
    Ok(())
}

async fn shutdown_signal(
    scheduler: Arc<SweepScheduler>,
    snapshot_worker: Arc<SnapshotWorker>,
    retention_worker: Arc<RetentionWorker>,
) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, stopping workers...");
    scheduler.stop();
    snapshot_worker.stop();
    retention_worker.stop();
}
