//! services/client/src/adapters/file_store.rs
//!
//! A `KeyValueStore` persisted as a flat JSON object on disk, the terminal
//! stand-in for the browser's `localStorage`.

use edwin_core::ports::{KeyValueStore, PortError, PortResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store; so is an
    /// unreadable one, which is overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> PortResult<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt store file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Starting with an empty store");
                BTreeMap::new()
            }
            Err(e) => return Err(storage_error(&path, e)),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Writes to a sibling file first so a crash never leaves half a document.
    fn flush(&self, entries: &BTreeMap<String, String>) -> PortResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| storage_error(parent, e))?;
            }
        }
        let body = serde_json::to_string_pretty(entries)
            .map_err(|e| PortError::Storage(e.to_string()))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, body).map_err(|e| storage_error(&staging, e))?;
        fs::rename(&staging, &self.path).map_err(|e| storage_error(&self.path, e))
    }

    /// Sets or clears `key` and flushes. The in-memory entry is restored when
    /// the flush fails, so memory never runs ahead of the file.
    fn write_entry(&self, entries: &mut BTreeMap<String, String>, key: &str, value: Option<String>) -> PortResult<()> {
        let previous = match value {
            Some(value) => entries.insert(key.to_string(), value),
            None => entries.remove(key),
        };
        if let Err(e) = self.flush(entries) {
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> PortError {
    PortError::Storage(format!("{}: {}", path.display(), e))
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_entry(&mut entries, key, Some(value.to_string()))
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(key) {
            return Ok(());
        }
        self.write_entry(&mut entries, key, None)
    }

    fn update(&self, key: &str, apply: &mut dyn FnMut(Option<&str>) -> Option<String>) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match apply(entries.get(key).map(String::as_str)) {
            Some(value) => self.write_entry(&mut entries, key, Some(value)),
            None => Ok(()),
        }
    }
}
