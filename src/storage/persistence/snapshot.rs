//! Snapshot manager for saving and restoring the observation store

use super::file::FileBackend;
use super::{PersistenceBackend, PersistenceConfig, PersistenceError};
use crate::storage::{ObservationStore, StoreSnapshot};
use parking_lot::RwLock;

const LATEST_KEY: &str = "_latest";
const SCHEMA_VERSION: u32 = 1;

/// Snapshot metadata
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SnapshotMetadata {
    /// Snapshot ID
    pub id: String,
    /// Creation timestamp (epoch ms)
    pub created_at: i64,
    pub endpoints: usize,
    pub measurements: usize,
    pub alerts: usize,
    /// Total size in bytes
    pub size_bytes: usize,
    /// Schema version for compatibility
    pub schema_version: u32,
}

/// Manages on-disk snapshots of the store
pub struct SnapshotManager {
    backend: Box<dyn PersistenceBackend>,
    keep_snapshots: usize,
    latest_snapshot: RwLock<Option<SnapshotMetadata>>,
}

impl SnapshotManager {
    /// Create a snapshot manager over a file backend in `config.data_dir`
    pub fn new(config: PersistenceConfig) -> Result<Self, PersistenceError> {
        let keep_snapshots = config.keep_snapshots;
        let backend = FileBackend::new(config)?;
        Self::with_backend(Box::new(backend), keep_snapshots)
    }

    pub fn with_backend(
        backend: Box<dyn PersistenceBackend>,
        keep_snapshots: usize,
    ) -> Result<Self, PersistenceError> {
        let manager = Self {
            backend,
            keep_snapshots: keep_snapshots.max(1),
            latest_snapshot: RwLock::new(None),
        };

        // Load latest snapshot metadata if exists
        manager.load_latest_metadata()?;

        Ok(manager)
    }

    fn load_latest_metadata(&self) -> Result<(), PersistenceError> {
        if let Some(data) = self.backend.read(LATEST_KEY)? {
            let metadata: SnapshotMetadata = serde_json::from_slice(&data)
                .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;
            *self.latest_snapshot.write() = Some(metadata);
        }
        Ok(())
    }

    /// Write a snapshot of the store and prune old ones
    pub fn create_snapshot(
        &self,
        store: &ObservationStore,
    ) -> Result<SnapshotMetadata, PersistenceError> {
        let created_at = chrono::Utc::now().timestamp_millis();
        let snapshot_id = format!("snapshot_{}", created_at);
        let snapshot = store.export();

        let data = serde_json::to_vec(&snapshot)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        self.backend.write(&snapshot_id, &data)?;

        let metadata = SnapshotMetadata {
            id: snapshot_id.clone(),
            created_at,
            endpoints: snapshot.records.len(),
            measurements: snapshot.records.iter().map(|r| r.measurements.len()).sum(),
            alerts: snapshot.records.iter().map(|r| r.alerts.len()).sum(),
            size_bytes: data.len(),
            schema_version: SCHEMA_VERSION,
        };

        let metadata_bytes = serde_json::to_vec(&metadata)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        self.backend
            .write(&format!("{}_meta", snapshot_id), &metadata_bytes)?;

        // Update latest pointer
        self.backend.write(LATEST_KEY, &metadata_bytes)?;
        *self.latest_snapshot.write() = Some(metadata.clone());

        self.backend.sync()?;

        let pruned = self.cleanup_old_snapshots(self.keep_snapshots)?;
        if pruned > 0 {
            tracing::debug!(pruned, "Removed old snapshots");
        }

        Ok(metadata)
    }

    /// Restore from the latest snapshot
    pub fn restore_latest(
        &self,
        store: &ObservationStore,
    ) -> Result<Option<SnapshotMetadata>, PersistenceError> {
        let metadata = match self.latest_snapshot() {
            Some(m) => m,
            None => return Ok(None),
        };

        check_schema(&metadata)?;
        self.restore_snapshot(store, &metadata.id)?;
        Ok(Some(metadata))
    }

    /// Restore a specific snapshot. Snapshots written under another schema
    /// version are rejected before the store is touched.
    pub fn restore_snapshot(
        &self,
        store: &ObservationStore,
        snapshot_id: &str,
    ) -> Result<(), PersistenceError> {
        if let Some(meta) = self.backend.read(&format!("{}_meta", snapshot_id))? {
            let metadata: SnapshotMetadata = serde_json::from_slice(&meta)
                .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;
            check_schema(&metadata)?;
        }

        let data = self
            .backend
            .read(snapshot_id)?
            .ok_or_else(|| PersistenceError::SnapshotNotFound(snapshot_id.to_string()))?;

        let snapshot: StoreSnapshot = serde_json::from_slice(&data)
            .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;

        store.restore(snapshot);
        Ok(())
    }

    /// Get the latest snapshot metadata
    pub fn latest_snapshot(&self) -> Option<SnapshotMetadata> {
        self.latest_snapshot.read().clone()
    }

    /// List all available snapshots, newest first
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotMetadata>, PersistenceError> {
        let keys = self.backend.list_keys()?;
        let mut snapshots = Vec::new();

        for key in keys {
            if key.ends_with("_meta") {
                if let Some(data) = self.backend.read(&key)? {
                    if let Ok(metadata) = serde_json::from_slice::<SnapshotMetadata>(&data) {
                        snapshots.push(metadata);
                    }
                }
            }
        }

        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(snapshots)
    }

    /// Delete old snapshots, keeping only the N most recent. The snapshot
    /// `_latest` points at is never deleted, even when a clock step makes it
    /// sort behind older ones.
    pub fn cleanup_old_snapshots(&self, keep_count: usize) -> Result<usize, PersistenceError> {
        let snapshots = self.list_snapshots()?;

        if snapshots.len() <= keep_count {
            return Ok(0);
        }

        let latest_id = self.latest_snapshot().map(|m| m.id);

        let mut deleted = 0;
        for snapshot in snapshots.iter().skip(keep_count) {
            if latest_id.as_deref() == Some(snapshot.id.as_str()) {
                continue;
            }
            self.backend.delete(&snapshot.id)?;
            self.backend.delete(&format!("{}_meta", snapshot.id))?;
            deleted += 1;
        }

        Ok(deleted)
    }
}

fn check_schema(metadata: &SnapshotMetadata) -> Result<(), PersistenceError> {
    if metadata.schema_version != SCHEMA_VERSION {
        return Err(PersistenceError::SchemaMismatch {
            snapshot: metadata.id.clone(),
            found: metadata.schema_version,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::transition;
    use crate::data::{CheckResult, EndpointSpec};
    use crate::storage::{CheckCommit, ObservationSink};
    use tempfile::TempDir;

    fn write_snapshot(backend: &FileBackend, metadata: &SnapshotMetadata) {
        let data = serde_json::to_vec(&StoreSnapshot::default()).unwrap();
        backend.write(&metadata.id, &data).unwrap();
        backend
            .write(
                &format!("{}_meta", metadata.id),
                &serde_json::to_vec(metadata).unwrap(),
            )
            .unwrap();
    }

    fn populated_store() -> ObservationStore {
        let store = ObservationStore::new();
        let endpoint = store
            .create_endpoint(EndpointSpec::new("api", "http://api.example").with_fail_threshold(1))
            .unwrap();
        let result = CheckResult::unreachable();
        store
            .commit_check(CheckCommit {
                endpoint_id: endpoint.id,
                expected_version: endpoint.state_version,
                result,
                transition: transition(endpoint.alert_state(), &result, &endpoint.thresholds()),
            })
            .unwrap();
        store
            .create_endpoint(EndpointSpec::new("web", "https://web.example"))
            .unwrap();
        store
    }

    #[test]
    fn test_snapshot_create_restore() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(PersistenceConfig::new(temp_dir.path())).unwrap();
        let store = populated_store();

        let metadata = manager.create_snapshot(&store).unwrap();
        assert_eq!(metadata.endpoints, 2);
        assert_eq!(metadata.measurements, 1);
        assert_eq!(metadata.alerts, 1);

        let restored = ObservationStore::new();
        manager.restore_snapshot(&restored, &metadata.id).unwrap();

        assert_eq!(restored.list_endpoints(), store.list_endpoints());
        let alerting = restored.list_endpoints()[0].clone();
        assert!(alerting.alert_active);
        assert_eq!(restored.recent_alerts(alerting.id, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_restore_latest_across_managers() {
        let temp_dir = TempDir::new().unwrap();

        {
            let manager = SnapshotManager::new(PersistenceConfig::new(temp_dir.path())).unwrap();
            assert!(manager
                .restore_latest(&ObservationStore::new())
                .unwrap()
                .is_none());
            manager.create_snapshot(&populated_store()).unwrap();
        }

        // A fresh manager finds the pointer left by the previous process
        let manager = SnapshotManager::new(PersistenceConfig::new(temp_dir.path())).unwrap();
        let store = ObservationStore::new();
        let restored = manager.restore_latest(&store).unwrap();
        assert!(restored.is_some());
        assert_eq!(store.endpoint_count(), 2);
    }

    #[test]
    fn test_old_snapshots_are_pruned() {
        let temp_dir = TempDir::new().unwrap();
        let config = PersistenceConfig::new(temp_dir.path()).with_keep_snapshots(2);
        let manager = SnapshotManager::new(config).unwrap();
        let store = populated_store();

        for _ in 0..4 {
            manager.create_snapshot(&store).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let snapshots = manager.list_snapshots().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(manager.latest_snapshot().unwrap().id, snapshots[0].id);
    }

    #[test]
    fn test_latest_survives_clock_step() {
        let temp_dir = TempDir::new().unwrap();
        let config = PersistenceConfig::new(temp_dir.path()).with_keep_snapshots(2);
        let backend = FileBackend::new(config.clone()).unwrap();

        // Two snapshots stamped ahead of the current clock, as left behind
        // before the wall clock was stepped back
        let ahead = chrono::Utc::now().timestamp_millis() + 3_600_000;
        for offset in 0..2 {
            write_snapshot(
                &backend,
                &SnapshotMetadata {
                    id: format!("snapshot_{}", ahead + offset),
                    created_at: ahead + offset,
                    endpoints: 0,
                    measurements: 0,
                    alerts: 0,
                    size_bytes: 0,
                    schema_version: SCHEMA_VERSION,
                },
            );
        }

        let manager = SnapshotManager::new(config.clone()).unwrap();
        let metadata = manager.create_snapshot(&populated_store()).unwrap();

        // The fresh snapshot sorts last but is still the one `_latest` names
        let ids: Vec<String> = manager
            .list_snapshots()
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert!(ids.contains(&metadata.id));

        let restarted = SnapshotManager::new(config).unwrap();
        let store = ObservationStore::new();
        let restored = restarted.restore_latest(&store).unwrap().unwrap();
        assert_eq!(restored.id, metadata.id);
        assert_eq!(store.endpoint_count(), 2);
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = PersistenceConfig::new(temp_dir.path());
        let manager = SnapshotManager::new(config.clone()).unwrap();
        let mut metadata = manager.create_snapshot(&populated_store()).unwrap();

        metadata.schema_version = SCHEMA_VERSION + 1;
        let backend = FileBackend::new(config.clone()).unwrap();
        let bytes = serde_json::to_vec(&metadata).unwrap();
        backend
            .write(&format!("{}_meta", metadata.id), &bytes)
            .unwrap();
        backend.write(LATEST_KEY, &bytes).unwrap();

        let store = ObservationStore::new();
        let err = manager.restore_snapshot(&store, &metadata.id).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::SchemaMismatch { found, expected, .. }
                if found == SCHEMA_VERSION + 1 && expected == SCHEMA_VERSION
        ));
        assert_eq!(store.endpoint_count(), 0);

        // Start-up goes through the pointer and refuses as well
        let restarted = SnapshotManager::new(config).unwrap();
        assert!(matches!(
            restarted.restore_latest(&store),
            Err(PersistenceError::SchemaMismatch { .. })
        ));
        assert_eq!(store.endpoint_count(), 0);
    }

    #[test]
    fn test_missing_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(PersistenceConfig::new(temp_dir.path())).unwrap();

        let err = manager
            .restore_snapshot(&ObservationStore::new(), "snapshot_0")
            .unwrap_err();
        assert!(matches!(err, PersistenceError::SnapshotNotFound(_)));
    }
}
