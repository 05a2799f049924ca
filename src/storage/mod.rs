pub mod engine;
pub mod persistence;
pub mod retention;
pub mod sink;

pub use engine::{EndpointRecord, ObservationStore, PruneStats, StorageError, StoreSnapshot};
pub use persistence::{PersistenceBackend, PersistenceConfig, SnapshotManager, SnapshotWorker};
pub use retention::{RetentionConfig, RetentionWorker};
pub use sink::{CheckCommit, CommittedCheck, EndpointRegistry, ObservationSink, SinkError};
