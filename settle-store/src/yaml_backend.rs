//! File-backed [`PersistentBackend`]: one flat YAML mapping per namespace.
//!
//! ```yaml
//! com.settle.support.Title: Contoso Support
//! com.settle.support.UptimeDaysLimit: 7
//! ```
//!
//! An in-memory mirror answers reads. Every mutation rewrites the whole file
//! through a `.yaml.tmp` sibling (`chmod 0600`, fsync, `rename`) and only then
//! updates the mirror, so a failed write leaves both the file and the mirror
//! as they were.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use settle_core::{BackendError, PersistentBackend, RawValue, Value};

use crate::error::{io_err, StoreError};
use crate::paths;

#[derive(Debug)]
pub struct YamlFileBackend {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, RawValue>>,
}

impl YamlFileBackend {
    /// Opens (or lazily creates) the store at `path`.
    ///
    /// A missing file is an empty store; nothing is written until the first
    /// mutation. A file that is not a flat mapping is a [`StoreError::Parse`].
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = read_entries(&path)?;
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened local preference store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn open_at(home: &Path, namespace: &str) -> Result<Self, StoreError> {
        Self::open_path(paths::local_store_path(home, namespace))
    }

    pub fn open(namespace: &str) -> Result<Self, StoreError> {
        Self::open_at(&paths::home()?, namespace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `edit` to a copy of the mirror, persists the copy, then swaps it in.
    fn mutate<F>(&self, edit: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, RawValue>) -> bool,
    {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        if !edit(&mut next) {
            return Ok(());
        }
        write_entries(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

impl PersistentBackend for YamlFileBackend {
    fn load(&self, key: &str) -> Result<Option<RawValue>, BackendError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn store(&self, key: &str, value: &Value) -> Result<(), BackendError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), RawValue::from(value));
            true
        })?;
        tracing::debug!(key, path = %self.path.display(), "stored preference");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.mutate(|entries| entries.remove(key).is_some())?;
        Ok(())
    }

    fn load_all(&self) -> Result<BTreeMap<String, RawValue>, BackendError> {
        Ok(self.entries.lock().clone())
    }
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

fn read_entries(path: &Path) -> Result<BTreeMap<String, RawValue>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(io_err(path, err)),
    };
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_yaml::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → fsync → `rename`.
fn write_entries(path: &Path, entries: &BTreeMap<String, RawValue>) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }
    }
    let yaml = serde_yaml::to_string(entries)?;
    let tmp = tmp_path(path);
    let result = write_tmp(&tmp, yaml.as_bytes()).and_then(|()| {
        fs::rename(&tmp, path).map_err(|e| io_err(path, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_tmp(tmp: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = fs::File::create(tmp).map_err(|e| io_err(tmp, e))?;
    set_file_permissions(tmp)?;
    file.write_all(bytes).map_err(|e| io_err(tmp, e))?;
    file.sync_all().map_err(|e| io_err(tmp, e))
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.yaml.tmp"))
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
