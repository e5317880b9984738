// =============================================================================
// Key-Value Store — injectable persistence boundary
// =============================================================================
//
// Both the symbol normalizer's override table and the ledger snapshot write
// through this trait. The default backend is in-memory; the file backend uses
// an atomic tmp + rename write so a crash mid-save cannot corrupt the file.
//
// Store failures are expected to be logged and absorbed by callers: the
// analytics core keeps functioning purely in memory when a backend misbehaves.
// =============================================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tracing::{info, warn};

/// Minimal key-value persistence interface.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

// =============================================================================
// InMemoryStore
// =============================================================================

/// Default in-memory backend. Never fails.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored. Exposed for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// Durable backend keeping all entries in a single JSON object file.
///
/// Every mutation rewrites the file through a `.tmp` sibling followed by a
/// rename, so readers never observe a partially written file.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or create) a file-backed store at `path`.
    ///
    /// A missing file starts empty; a corrupt file is logged and discarded
    /// rather than failing initialization.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(map) => {
                    info!(path = %path.display(), keys = map.len(), "kv store loaded");
                    map
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "kv store file corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Persist the current entry map atomically (write tmp, then rename).
    fn flush(&self, entries: &HashMap<String, String>) -> Result<()> {
        let content =
            serde_json::to_string_pretty(entries).context("failed to serialise kv store")?;

        let tmp_path = self.path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp kv store to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp kv store to {}", self.path.display()))?;

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.remove(key);
        self.flush(&entries)
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write();
        entries.clear();
        self.flush(&entries)
    }
}
