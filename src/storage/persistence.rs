//! File-backed key/value store.
//!
//! Each key lives in its own `<key>.json` file under the store directory.
//! Writes go to a temp file in the same directory and are then renamed over
//! the target, so a reader never observes a half-written value.

use super::KeyValueStore;
use crate::core::{Result, SyncError};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            SyncError::Storage(format!("Failed to create store directory '{}': {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Storage(format!("Failed to read '{}': {}", key, e))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut temp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| SyncError::Storage(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(value.as_bytes())
            .map_err(|e| SyncError::Storage(format!("Failed to write '{}': {}", key, e)))?;
        temp.flush()
            .map_err(|e| SyncError::Storage(format!("Failed to flush '{}': {}", key, e)))?;
        temp.persist(self.path_for(key))
            .map_err(|e| SyncError::Storage(format!("Failed to replace '{}': {}", key, e)))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Storage(format!("Failed to delete '{}': {}", key, e))),
        }
    }
}
