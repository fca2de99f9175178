//! Snapshot persistence.
//!
//! The snapshot maps each wishlist URL to the last item set a notification
//! was sent for. It is loaded once at startup and written back after every
//! pass.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Item;

/// Wishlist URL to the items last reported for it.
pub type SnapshotMap = BTreeMap<String, Vec<Item>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load/save capability for the snapshot map.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<SnapshotMap, StoreError>;
    fn save(&self, snapshot: &SnapshotMap) -> Result<(), StoreError>;
}

/// On-disk entry; older files stored bare item names.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredItem {
    Full(Item),
    Legacy(String),
}

impl StoredItem {
    fn is_legacy(&self) -> bool {
        matches!(self, StoredItem::Legacy(_))
    }

    fn into_item(self) -> Item {
        match self {
            StoredItem::Full(item) => item,
            StoredItem::Legacy(name) => Item::new(Some(name), None, None),
        }
    }
}

/// Pretty-printed JSON file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> Result<SnapshotMap, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting fresh", self.path.display());
                return Ok(SnapshotMap::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let stored: BTreeMap<String, Vec<StoredItem>> =
            serde_json::from_str(&raw).map_err(|source| StoreError::Format {
                path: self.path.clone(),
                source,
            })?;

        let had_legacy = stored.values().flatten().any(StoredItem::is_legacy);
        let snapshot: SnapshotMap = stored
            .into_iter()
            .map(|(url, items)| (url, items.into_iter().map(StoredItem::into_item).collect()))
            .collect();

        if had_legacy {
            info!("Upgrading legacy snapshot format in {}", self.path.display());
            if let Err(e) = self.save(&snapshot) {
                warn!("Failed to rewrite upgraded snapshot: {}", e);
            }
        }

        Ok(snapshot)
    }

    fn save(&self, snapshot: &SnapshotMap) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let json = serde_json::to_string_pretty(snapshot).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }
}

/// In-process store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    inner: std::sync::Mutex<SnapshotMap>,
}

impl MemorySnapshotStore {
    pub fn new(initial: SnapshotMap) -> Self {
        Self {
            inner: std::sync::Mutex::new(initial),
        }
    }

    /// Copy of the last saved map.
    pub fn snapshot(&self) -> SnapshotMap {
        self.inner.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<SnapshotMap, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, snapshot: &SnapshotMap) -> Result<(), StoreError> {
        if let Ok(mut inner) = self.inner.lock() {
            *inner = snapshot.clone();
        }
        Ok(())
    }
}
