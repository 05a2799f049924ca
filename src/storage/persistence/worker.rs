use super::{PersistenceError, SnapshotManager, SnapshotMetadata};
use crate::storage::ObservationStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Snapshot worker that periodically writes the store to disk
pub struct SnapshotWorker {
    store: Arc<ObservationStore>,
    manager: Arc<SnapshotManager>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl SnapshotWorker {
    pub fn new(
        store: Arc<ObservationStore>,
        manager: Arc<SnapshotManager>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            manager,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background worker
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!("Snapshot worker started with interval {:?}", self.interval);

            let mut interval = time::interval(self.interval);
            // The first tick completes immediately; nothing new to save yet
            interval.tick().await;

            while self.running.load(Ordering::SeqCst) {
                interval.tick().await;

                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = self.snapshot_now() {
                    tracing::error!(error = %e, "Snapshot failed");
                }
            }

            tracing::info!("Snapshot worker stopped");
        })
    }

    /// Stop the worker
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if worker is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Write a snapshot immediately
    pub fn snapshot_now(&self) -> Result<SnapshotMetadata, PersistenceError> {
        let metadata = self.manager.create_snapshot(&self.store)?;
        tracing::debug!(
            snapshot_id = %metadata.id,
            endpoints = metadata.endpoints,
            measurements = metadata.measurements,
            size_bytes = metadata.size_bytes,
            "Snapshot written"
        );
        Ok(metadata)
    }
}
