// ============================================================================
// spark-store - File-Backed Store
// A memory store persisted as one JSON object on disk
// ============================================================================

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::memory::MemoryStore;
use super::{ChangeCallback, Store, SubscriptionId};
use crate::error::{Result, StoreError};

// =============================================================================
// OPTIONS
// =============================================================================

/// How a [`FileStore`] writes its document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreOptions {
    /// Indent the JSON document.
    pub pretty: bool,
    /// Save after every set or remove. When off, call [`FileStore::save`].
    pub write_through: bool,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            write_through: true,
        }
    }
}

impl FileStoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_write_through(mut self, write_through: bool) -> Self {
        self.write_through = write_through;
        self
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

struct FileInner {
    core: MemoryStore,
    path: PathBuf,
    options: FileStoreOptions,
    save_lock: Mutex<()>,
}

/// A store whose contents live in a JSON file.
///
/// The file holds a single object mapping keys to values. Reads and
/// notifications are served from memory; writes go to memory first and are
/// then saved to disk. A failed save is logged and the in-memory value is
/// kept.
///
/// # Example
///
/// ```
/// use spark_store::{FileStore, Key, StoreExt};
///
/// const FONT_SIZE: Key<u16> = Key::new("font_size", || 12);
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("prefs.json");
///
/// let store = FileStore::open(&path).unwrap();
/// store.set_value(&FONT_SIZE, 14);
///
/// let reopened = FileStore::open(&path).unwrap();
/// assert_eq!(reopened.value(&FONT_SIZE), 14);
/// ```
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<FileInner>,
}

impl FileStore {
    /// Open `path` with default options. A missing file opens empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, FileStoreOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: FileStoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let core = MemoryStore::named(path.display().to_string());

        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => {}
            Ok(content) => {
                let document: Value =
                    serde_json::from_str(&content).map_err(|source| StoreError::Decode {
                        path: path.clone(),
                        source,
                    })?;
                let Value::Object(values) = document else {
                    return Err(StoreError::NotAnObject { path });
                };
                core.replace_silently(values);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        tracing::debug!(path = %path.display(), entries = core.len(), "opened file store");

        Ok(Self {
            inner: Arc::new(FileInner {
                core,
                path,
                options,
                save_lock: Mutex::new(()),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn options(&self) -> &FileStoreOptions {
        &self.inner.options
    }

    /// The in-memory contents.
    pub fn memory(&self) -> &MemoryStore {
        &self.inner.core
    }

    /// Write the current contents to disk.
    ///
    /// The document is written to a sibling temp file and renamed over the
    /// target, so readers never observe a partial file.
    pub fn save(&self) -> Result<()> {
        let _guard = self
            .inner
            .save_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let path = &self.inner.path;
        let persist_err = |source: io::Error| StoreError::Persist {
            path: path.clone(),
            source,
        };

        let document = Value::Object(self.inner.core.snapshot());
        let bytes = if self.inner.options.pretty {
            serde_json::to_vec_pretty(&document)
        } else {
            serde_json::to_vec(&document)
        }
        .map_err(|err| persist_err(err.into()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persist_err)?;
        }

        let tmp = temp_path(path);
        fs::write(&tmp, bytes).map_err(persist_err)?;
        fs::rename(&tmp, path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            persist_err(err)
        })?;

        tracing::trace!(path = %path.display(), "saved file store");
        Ok(())
    }

    fn after_write(&self) {
        if !self.inner.options.write_through {
            return;
        }
        if let Err(err) = self.save() {
            tracing::error!(path = %self.inner.path.display(), error = %err, "failed to persist store");
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.inner.path)
            .field("options", &self.inner.options)
            .field("len", &self.inner.core.len())
            .finish()
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.core.get(key)
    }

    fn set(&self, key: &str, value: Value) {
        self.inner.core.set(key, value);
        self.after_write();
    }

    fn remove(&self, key: &str) {
        if self.inner.core.get(key).is_none() {
            return;
        }
        self.inner.core.remove(key);
        self.after_write();
    }

    fn subscribe(&self, key: &str, callback: ChangeCallback) -> SubscriptionId {
        self.inner.core.subscribe(key, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.core.unsubscribe(id)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.core.keys()
    }
}
