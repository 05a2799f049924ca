//! One-file-per-key backend

use super::{PersistenceBackend, PersistenceConfig, PersistenceError};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

const EXTENSION: &str = "json";

/// Stores each key as `<data_dir>/<key>.json`
pub struct FileBackend {
    config: PersistenceConfig,
    /// Serializes writers so temp files never collide
    write_lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(config: PersistenceConfig) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(Self {
            config,
            write_lock: Mutex::new(()),
        })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.config.data_dir.join(format!("{}.{}", key, EXTENSION))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.config.data_dir.join(format!(".{}.tmp", key))
    }
}

impl PersistenceBackend for FileBackend {
    fn write(&self, key: &str, data: &[u8]) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock();
        let temp = self.temp_path(key);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp)?;
        file.write_all(data)?;
        file.sync_all()?;

        // Readers see either the old file or the complete new one
        std::fs::rename(&temp, self.key_path(key))?;

        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.key_path(key);

        if !path.exists() {
            return Ok(None);
        }

        let data = std::fs::read(path)?;
        Ok(Some(data))
    }

    fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.key_path(key);

        if path.exists() {
            std::fs::remove_file(path)?;
        }

        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<String>, PersistenceError> {
        let mut keys = Vec::new();

        for entry in std::fs::read_dir(&self.config.data_dir)? {
            let path = entry?.path();

            if path.extension().map(|ext| ext == EXTENSION).unwrap_or(false) {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(name.to_string());
                }
            }
        }

        Ok(keys)
    }

    fn sync(&self) -> Result<(), PersistenceError> {
        // File contents are synced on write; this persists the renames
        #[cfg(unix)]
        File::open(&self.config.data_dir)?.sync_all()?;
        Ok(())
    }
}
