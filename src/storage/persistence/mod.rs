//! Snapshot persistence for the observation store
//!
//! The whole store is serialized to one JSON document per snapshot. Snapshots
//! are taken on a fixed interval and once more at shutdown, so a crash loses
//! at most one interval of observations.

pub mod file;
pub mod snapshot;
pub mod worker;

pub use file::FileBackend;
pub use snapshot::{SnapshotManager, SnapshotMetadata};
pub use worker::SnapshotWorker;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{env_or, require_positive, ConfigError};

pub const DEFAULT_DATA_DIR: &str = "./nethealth_data";
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_KEEP_SNAPSHOTS: usize = 3;

/// Key/blob storage underneath the snapshot manager. Keys are flat names
/// such as `snapshot_1700000000000` or `_latest`.
pub trait PersistenceBackend: Send + Sync {
    /// Replace the blob stored under `key`. Readers never observe a partial write.
    fn write(&self, key: &str, data: &[u8]) -> Result<(), PersistenceError>;

    /// `None` when nothing is stored under `key`
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// Removing a missing key is not an error
    fn delete(&self, key: &str) -> Result<(), PersistenceError>;

    fn list_keys(&self) -> Result<Vec<String>, PersistenceError>;

    /// Flush completed writes to durable storage
    fn sync(&self) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceConfig {
    /// Directory holding snapshot files
    pub data_dir: PathBuf,
    pub snapshot_interval: Duration,
    /// Older snapshots beyond this count are pruned
    pub keep_snapshots: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            keep_snapshots: DEFAULT_KEEP_SNAPSHOTS,
        }
    }
}

impl PersistenceConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Read persistence settings from environment variables
    /// NETHEALTH_DATA_DIR=./nethealth_data
    /// NETHEALTH_SNAPSHOT_INTERVAL_SECONDS=30
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir =
            std::env::var("NETHEALTH_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());

        let interval_secs: u64 = env_or(
            "NETHEALTH_SNAPSHOT_INTERVAL_SECONDS",
            DEFAULT_SNAPSHOT_INTERVAL.as_secs(),
        )?;
        require_positive("NETHEALTH_SNAPSHOT_INTERVAL_SECONDS", interval_secs)?;

        Ok(Self::new(data_dir).with_snapshot_interval(Duration::from_secs(interval_secs)))
    }

    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn with_keep_snapshots(mut self, keep: usize) -> Self {
        self.keep_snapshots = keep;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Snapshot {snapshot} has schema version {found}, expected {expected}")]
    SchemaMismatch {
        snapshot: String,
        found: u32,
        expected: u32,
    },
}
