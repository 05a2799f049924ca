//! nethealth server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - NETHEALTH_HOST: Bind address (default: 0.0.0.0)
//! - NETHEALTH_PORT: Port number (default: 8080)
//! - NETHEALTH_POLL_INTERVAL_SECONDS: Seconds between sweeps (default: 60)
//! - NETHEALTH_HTTP_TIMEOUT_SECONDS: Per-probe timeout, fractional allowed (default: 5.0)
//! - NETHEALTH_MAX_CONCURRENT_PROBES: Probes in flight per sweep (default: 16)
//! - NETHEALTH_DATA_DIR: Snapshot directory (default: ./nethealth_data)
//! - NETHEALTH_SNAPSHOT_INTERVAL_SECONDS: Seconds between snapshots (default: 30)
//! - NETHEALTH_RETENTION_HOURS: Hours of measurements and alerts to keep (default: 168)
//! - RUST_LOG: Log filter (default: nethealth=info,tower_http=info)

use nethealth::api::{run_server, ServerConfig};
use nethealth::config::env_or;
use nethealth::scheduler::SchedulerConfig;
use nethealth::storage::{PersistenceConfig, RetentionConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nethealth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e);
        }
    };

    tracing::info!("nethealth configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!(
        "  Poll interval: {} seconds",
        config.scheduler.poll_interval.as_secs()
    );
    tracing::info!(
        "  Probe timeout: {:.1} seconds",
        config.scheduler.probe_timeout.as_secs_f64()
    );
    tracing::info!(
        "  Max concurrent probes: {}",
        config.scheduler.max_concurrent_probes
    );
    tracing::info!("  Data dir: {}", config.persistence.data_dir.display());
    tracing::info!(
        "  Snapshot interval: {} seconds",
        config.persistence.snapshot_interval.as_secs()
    );
    tracing::info!(
        "  Retention: {} hours",
        config.retention.max_age.as_secs() / 3600
    );

    println!(
        r#"
             _   _                _ _   _
  _ __   ___| |_| |__   ___  __ _| | |_| |__
 | '_ \ / _ \ __| '_ \ / _ \/ _` | | __| '_ \
 | | | |  __/ |_| | | |  __/ (_| | | |_| | | |
 |_| |_|\___|\__|_| |_|\___|\__,_|_|\__|_| |_|

 HTTP Endpoint Health Monitor
 Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );

    run_server(config).await
}

fn load_config() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let host = std::env::var("NETHEALTH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env_or("NETHEALTH_PORT", 8080)?;

    let scheduler = SchedulerConfig::from_env()?;
    let persistence = PersistenceConfig::from_env()?;
    let retention = RetentionConfig::from_env()?;

    Ok(ServerConfig {
        host,
        port,
        scheduler,
        persistence,
        retention,
    })
}
