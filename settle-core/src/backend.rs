//! Collaborator interfaces consumed by the registry, plus in-memory adapters.
//!
//! - [`PersistentBackend`]: durable storage for locally-set values.
//! - [`ManagedOverrideSource`]: read-only producer of managed snapshots.
//!
//! Both are synchronous from the registry's point of view. A backend must give
//! read-your-writes: a `load` right after a successful `store` sees the value.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::BackendError;
use crate::value::{RawValue, Value};

/// Durable key/value storage for the local tier.
///
/// Keys passed in are already namespaced by the registry.
pub trait PersistentBackend: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<RawValue>, BackendError>;

    /// Must be durable once it returns `Ok`.
    fn store(&self, key: &str, value: &Value) -> Result<(), BackendError>;

    fn remove(&self, key: &str) -> Result<(), BackendError>;

    fn load_all(&self) -> Result<BTreeMap<String, RawValue>, BackendError>;

    /// Flush anything buffered. Called by [`crate::Registry::shutdown`].
    fn flush(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// External source of authoritative values. The registry never writes to it.
pub trait ManagedOverrideSource: Send + Sync {
    fn snapshot(&self) -> Result<ManagedSnapshot, BackendError>;
}

/// A full managed tier: plain (un-namespaced) key names to raw scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedSnapshot {
    pub values: BTreeMap<String, RawValue>,
    pub taken_at: DateTime<Utc>,
}

impl ManagedSnapshot {
    pub fn new(values: BTreeMap<String, RawValue>) -> Self {
        Self {
            values,
            taken_at: Utc::now(),
        }
    }

    /// The "not managed" snapshot.
    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Builder-style insert, handy for tests and static profiles.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl Default for ManagedSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for ManagedSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// In-memory adapters
// ---------------------------------------------------------------------------

/// Process-local backend. Clones made with [`MemoryBackend::clone_handle`]
/// share storage, which lets tests rebuild a registry over the same data.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<BTreeMap<String, RawValue>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw entries, including ones that will not decode.
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, RawValue)>,
        K: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            entries: Arc::new(Mutex::new(map)),
        }
    }

    pub fn clone_handle(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }

    pub fn raw(&self, key: &str) -> Option<RawValue> {
        self.entries.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl PersistentBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<RawValue>, BackendError> {
        Ok(self.raw(key))
    }

    fn store(&self, key: &str, value: &Value) -> Result<(), BackendError> {
        self.entries.lock().insert(key.to_owned(), RawValue::from(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn load_all(&self) -> Result<BTreeMap<String, RawValue>, BackendError> {
        Ok(self.entries.lock().clone())
    }
}

/// Managed source serving a snapshot that can be swapped at any time.
#[derive(Debug, Default)]
pub struct StaticSource {
    snapshot: Mutex<ManagedSnapshot>,
}

impl StaticSource {
    pub fn new(snapshot: ManagedSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn replace(&self, snapshot: ManagedSnapshot) {
        *self.snapshot.lock() = snapshot;
    }
}

impl ManagedOverrideSource for StaticSource {
    fn snapshot(&self) -> Result<ManagedSnapshot, BackendError> {
        Ok(self.snapshot.lock().clone())
    }
}
