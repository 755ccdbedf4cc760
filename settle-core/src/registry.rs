//! The preference registry: tier resolution, writes, managed refresh, fan-out.
//!
//! # Resolution
//!
//! ```text
//! Managed  (refresh_managed_overrides, read-only to the process)
//!   > Local  (set / reset_to_default, persisted through the backend)
//!     > Default  (compiled into the KeyDefinition)
//! ```
//!
//! A raw value that does not decode to the key's declared type is absent at
//! its tier and resolution falls through to the next one.
//!
//! # Locking
//!
//! The definition table is frozen by [`Registry::register`] and read without
//! locks. Each key owns two locks:
//! - `tiers`: short critical sections around reading and committing tiers;
//! - `notify`: held across a whole mutate-then-notify sequence, so a key's
//!   notifications are delivered in commit order.
//!
//! Writes to different keys never contend. A managed refresh takes every
//! `notify` lock in registration order before replacing the tier.
//!
//! Callbacks run on the mutating thread and may call [`Registry::get`]. A
//! mutation issued from inside a callback fails with
//! [`RegistryError::Reentrant`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::backend::{ManagedOverrideSource, ManagedSnapshot, PersistentBackend};
use crate::definition::{KeyDefinition, TypedKey};
use crate::error::RegistryError;
use crate::observer::{ChangeEvent, KeyFilter, ObserverSet, Subscription};
use crate::value::{EffectiveValue, FromValue, RawValue, Tier, Value};

// ---------------------------------------------------------------------------
// 1. Internal state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tiers {
    managed: Option<RawValue>,
    local: Option<RawValue>,
}

#[derive(Debug)]
struct Slot {
    def: KeyDefinition,
    tiers: RwLock<Tiers>,
    notify: Mutex<()>,
}

impl Slot {
    fn resolve(&self) -> EffectiveValue {
        resolve(&self.def, &self.tiers.read())
    }
}

#[derive(Debug)]
struct KeyTable {
    slots: Vec<Slot>,
    index: HashMap<&'static str, usize>,
}

impl KeyTable {
    fn slot(&self, key: &str) -> Result<(usize, &Slot), RegistryError> {
        self.index
            .get(key)
            .map(|&idx| (idx, &self.slots[idx]))
            .ok_or_else(|| RegistryError::UnknownKey {
                key: key.to_owned(),
            })
    }
}

fn resolve(def: &KeyDefinition, tiers: &Tiers) -> EffectiveValue {
    if let Some(value) = decode_at(def, Tier::Managed, tiers.managed.as_ref()) {
        return EffectiveValue::new(value, Tier::Managed);
    }
    if let Some(value) = decode_at(def, Tier::Local, tiers.local.as_ref()) {
        return EffectiveValue::new(value, Tier::Local);
    }
    EffectiveValue::new(def.default_value(), Tier::Default)
}

fn decode_at(def: &KeyDefinition, tier: Tier, raw: Option<&RawValue>) -> Option<Value> {
    let raw = raw?;
    let decoded = raw.decode(def.value_type());
    if decoded.is_none() {
        tracing::debug!(
            key = def.key,
            %tier,
            expected = %def.value_type(),
            got = raw.kind(),
            "raw value does not match declared type; falling through",
        );
    }
    decoded
}

fn warn_if_undecodable(def: &KeyDefinition, tier: Tier, raw: &RawValue) {
    if raw.decode(def.value_type()).is_none() {
        tracing::warn!(
            key = def.key,
            %tier,
            expected = %def.value_type(),
            got = raw.kind(),
            "raw value does not match declared type; tier treated as absent",
        );
    }
}

thread_local! {
    /// Registries currently dispatching notifications on this thread.
    static DISPATCHING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

struct DispatchScope {
    registry: usize,
}

impl DispatchScope {
    fn enter(registry: usize) -> Self {
        DISPATCHING.with(|d| d.borrow_mut().push(registry));
        Self { registry }
    }

    fn active(registry: usize) -> bool {
        DISPATCHING.with(|d| d.borrow().contains(&registry))
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|d| {
            let mut d = d.borrow_mut();
            if let Some(pos) = d.iter().rposition(|&r| r == self.registry) {
                d.remove(pos);
            }
        });
    }
}

// ---------------------------------------------------------------------------
// 2. Registry
// ---------------------------------------------------------------------------

/// Typed, observable preference store over a [`PersistentBackend`].
///
/// Construct with [`Registry::new`], then call [`Registry::register`] once
/// with the full definition table before any other operation.
pub struct Registry {
    backend: Arc<dyn PersistentBackend>,
    namespace: String,
    table: OnceLock<KeyTable>,
    observers: Arc<ObserverSet>,
    refresh_lock: Mutex<()>,
    managed_refreshed_at: RwLock<Option<DateTime<Utc>>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("namespace", &self.namespace)
            .field("keys", &self.table.get().map(|t| t.slots.len()))
            .field("observers", &self.observers)
            .field("shut_down", &self.shut_down.load(Ordering::Acquire))
            .finish()
    }
}

impl Registry {
    /// Creates an uninitialised registry. Backend keys are `"{namespace}.{key}"`
    /// (or just `key` when `namespace` is empty).
    pub fn new(backend: Arc<dyn PersistentBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            table: OnceLock::new(),
            observers: ObserverSet::new(),
            refresh_lock: Mutex::new(()),
            managed_refreshed_at: RwLock::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name under which `key` is persisted.
    pub fn storage_key(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.namespace)
        }
    }

    fn plain_key<'a>(&self, storage_key: &'a str) -> Option<&'a str> {
        if self.namespace.is_empty() {
            return Some(storage_key);
        }
        storage_key
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
    }

    fn id(&self) -> usize {
        self as *const Registry as usize
    }

    fn table(&self) -> Result<&KeyTable, RegistryError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(RegistryError::ShutDown);
        }
        self.table.get().ok_or(RegistryError::NotInitialized)
    }

    fn guard_reentry(&self, operation: &'static str) -> Result<(), RegistryError> {
        if DispatchScope::active(self.id()) {
            return Err(RegistryError::Reentrant { operation });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // 2a. Registration and teardown
    // -----------------------------------------------------------------------

    /// Registers the full definition table and loads the local tier.
    ///
    /// Fails with `DuplicateKey` if two definitions share a key, with
    /// `AlreadyInitialized` on a second call, and with `BackendFailure` if the
    /// backend cannot enumerate its entries (the registry stays uninitialised).
    pub fn register<I>(&self, defs: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = KeyDefinition>,
    {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(RegistryError::ShutDown);
        }
        if self.table.get().is_some() {
            return Err(RegistryError::AlreadyInitialized);
        }

        let mut slots = Vec::new();
        let mut index = HashMap::new();
        for def in defs {
            if index.insert(def.key, slots.len()).is_some() {
                return Err(RegistryError::DuplicateKey {
                    key: def.key.to_owned(),
                });
            }
            slots.push(Slot {
                def,
                tiers: RwLock::new(Tiers::default()),
                notify: Mutex::new(()),
            });
        }

        let stored = self
            .backend
            .load_all()
            .map_err(RegistryError::BackendFailure)?;
        let mut loaded = 0usize;
        for (storage_key, raw) in stored {
            let Some(&idx) = self.plain_key(&storage_key).and_then(|k| index.get(k)) else {
                tracing::debug!(key = %storage_key, "ignoring stored entry with no definition");
                continue;
            };
            let slot = &mut slots[idx];
            warn_if_undecodable(&slot.def, Tier::Local, &raw);
            slot.tiers.get_mut().local = Some(raw);
            loaded += 1;
        }

        let keys = slots.len();
        self.table
            .set(KeyTable { slots, index })
            .map_err(|_| RegistryError::AlreadyInitialized)?;
        tracing::info!(
            namespace = %self.namespace,
            keys,
            local = loaded,
            "registered preference definitions",
        );
        Ok(())
    }

    /// Flushes the backend. Every later operation fails with `ShutDown`.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) -> Result<(), RegistryError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.backend.flush().map_err(|err| {
            tracing::error!(error = %err, "backend flush failed during shutdown");
            RegistryError::BackendFailure(err)
        })?;
        tracing::info!(namespace = %self.namespace, "preference registry shut down");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.table.get().is_some()
    }

    // -----------------------------------------------------------------------
    // 2b. Reads
    // -----------------------------------------------------------------------

    /// Effective value of `key`: Managed > Local > Default.
    pub fn get(&self, key: &str) -> Result<EffectiveValue, RegistryError> {
        let (_, slot) = self.table()?.slot(key)?;
        Ok(slot.resolve())
    }

    /// Typed read through a [`TypedKey`].
    pub fn value<T: FromValue>(&self, key: TypedKey<T>) -> Result<T, RegistryError> {
        let (_, slot) = self.table()?.slot(key.key())?;
        let mismatch = || RegistryError::TypeMismatch {
            key: key.key().to_owned(),
            expected: slot.def.value_type(),
            got: T::VALUE_TYPE,
        };
        if slot.def.value_type() != T::VALUE_TYPE {
            return Err(mismatch());
        }
        T::from_value(slot.resolve().value).ok_or_else(mismatch)
    }

    /// Whether a well-typed managed value currently governs `key`.
    pub fn is_managed(&self, key: &str) -> Result<bool, RegistryError> {
        let (_, slot) = self.table()?.slot(key)?;
        let tiers = slot.tiers.read();
        Ok(tiers
            .managed
            .as_ref()
            .and_then(|raw| raw.decode(slot.def.value_type()))
            .is_some())
    }

    /// Every key's effective value, in registration order.
    pub fn effective_values(&self) -> Result<Vec<(&'static str, EffectiveValue)>, RegistryError> {
        let table = self.table()?;
        Ok(table
            .slots
            .iter()
            .map(|slot| (slot.def.key, slot.resolve()))
            .collect())
    }

    pub fn definition(&self, key: &str) -> Result<&KeyDefinition, RegistryError> {
        Ok(&self.table()?.slot(key)?.1.def)
    }

    /// Registered definitions, in registration order.
    pub fn definitions(&self) -> Result<impl Iterator<Item = &KeyDefinition> + '_, RegistryError> {
        Ok(self.table()?.slots.iter().map(|slot| &slot.def))
    }

    /// When the managed tier was last replaced, if ever.
    pub fn managed_refreshed_at(&self) -> Option<DateTime<Utc>> {
        *self.managed_refreshed_at.read()
    }

    // -----------------------------------------------------------------------
    // 2c. Local writes
    // -----------------------------------------------------------------------

    /// Sets the local value of `key`.
    ///
    /// While a managed override governs `key` the call succeeds without
    /// persisting anything: the managed tier keeps winning. Otherwise the value
    /// is persisted first and committed to memory only if that succeeded.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), RegistryError> {
        let value = value.into();
        let table = self.table()?;
        let (_, slot) = table.slot(key)?;
        if value.value_type() != slot.def.value_type() {
            return Err(RegistryError::TypeMismatch {
                key: key.to_owned(),
                expected: slot.def.value_type(),
                got: value.value_type(),
            });
        }
        self.guard_reentry("set")?;

        let _serial = slot.notify.lock();
        let old = slot.resolve();
        if old.tier == Tier::Managed {
            tracing::debug!(key, value = %value, "ignoring local write to managed key");
            return Ok(());
        }

        let storage_key = self.storage_key(key);
        self.backend.store(&storage_key, &value).map_err(|err| {
            tracing::error!(key, error = %err, "failed to persist local value");
            RegistryError::BackendFailure(err)
        })?;

        let new = {
            let mut tiers = slot.tiers.write();
            tiers.local = Some(RawValue::from(&value));
            resolve(&slot.def, &tiers)
        };
        tracing::debug!(key, value = %value, "local value stored");
        self.notify_if_changed(&slot.def, old, new);
        Ok(())
    }

    /// Typed write through a [`TypedKey`].
    pub fn set_value<T>(&self, key: TypedKey<T>, value: T) -> Result<(), RegistryError>
    where
        T: FromValue + Into<Value>,
    {
        self.set(key.key(), value)
    }

    /// Removes the persisted local value of `key`. The managed tier is untouched.
    pub fn reset_to_default(&self, key: &str) -> Result<(), RegistryError> {
        let table = self.table()?;
        let (_, slot) = table.slot(key)?;
        self.guard_reentry("reset_to_default")?;

        let _serial = slot.notify.lock();
        let old = slot.resolve();
        let storage_key = self.storage_key(key);
        self.backend.remove(&storage_key).map_err(|err| {
            tracing::error!(key, error = %err, "failed to remove local value");
            RegistryError::BackendFailure(err)
        })?;

        let new = {
            let mut tiers = slot.tiers.write();
            tiers.local = None;
            resolve(&slot.def, &tiers)
        };
        tracing::debug!(key, "local value reset");
        self.notify_if_changed(&slot.def, old, new);
        Ok(())
    }

    fn notify_if_changed(&self, def: &KeyDefinition, old: EffectiveValue, new: EffectiveValue) {
        if old.same_value(&new) {
            return;
        }
        let event = ChangeEvent {
            key: def.key.to_owned(),
            old,
            new,
        };
        let _scope = DispatchScope::enter(self.id());
        self.observers.dispatch(&event);
    }

    // -----------------------------------------------------------------------
    // 2d. Managed tier
    // -----------------------------------------------------------------------

    /// Replaces the whole managed tier with `snapshot`.
    ///
    /// Entries for unknown or local-only keys are dropped. Once every key has
    /// been swapped, exactly one notification fires per key whose effective
    /// value changed. Returns the changed keys in registration order.
    pub fn refresh_managed_overrides(
        &self,
        snapshot: ManagedSnapshot,
    ) -> Result<Vec<&'static str>, RegistryError> {
        let table = self.table()?;
        self.guard_reentry("refresh_managed_overrides")?;

        let mut incoming: Vec<Option<RawValue>> = vec![None; table.slots.len()];
        for (key, raw) in snapshot.values {
            let Some(&idx) = table.index.get(key.as_str()) else {
                tracing::debug!(key = %key, "managed snapshot entry has no definition; ignored");
                continue;
            };
            let def = &table.slots[idx].def;
            if !def.is_manageable() {
                tracing::warn!(key = %key, "managed snapshot targets a local-only key; ignored");
                continue;
            }
            warn_if_undecodable(def, Tier::Managed, &raw);
            incoming[idx] = Some(raw);
        }

        let _refresh = self.refresh_lock.lock();
        let _serial: Vec<_> = table.slots.iter().map(|slot| slot.notify.lock()).collect();

        let mut events = Vec::new();
        let mut changed = Vec::new();
        {
            let mut guards: Vec<_> = table.slots.iter().map(|slot| slot.tiers.write()).collect();
            for ((slot, tiers), managed) in table.slots.iter().zip(guards.iter_mut()).zip(incoming) {
                let old = resolve(&slot.def, tiers);
                tiers.managed = managed;
                let new = resolve(&slot.def, tiers);
                if !old.same_value(&new) {
                    changed.push(slot.def.key);
                    events.push(ChangeEvent {
                        key: slot.def.key.to_owned(),
                        old,
                        new,
                    });
                }
            }
        }
        *self.managed_refreshed_at.write() = Some(snapshot.taken_at);

        tracing::info!(
            namespace = %self.namespace,
            changed = changed.len(),
            "managed overrides refreshed",
        );

        let _scope = DispatchScope::enter(self.id());
        for event in &events {
            self.observers.dispatch(event);
        }
        Ok(changed)
    }

    /// Pulls a snapshot from `source` and applies it. A source failure leaves
    /// the managed tier as it was.
    pub fn refresh_from(
        &self,
        source: &dyn ManagedOverrideSource,
    ) -> Result<Vec<&'static str>, RegistryError> {
        let snapshot = source.snapshot().map_err(|err| {
            tracing::warn!(error = %err, "managed override source failed; keeping current tier");
            RegistryError::ManagedSourceFailure(err)
        })?;
        self.refresh_managed_overrides(snapshot)
    }

    // -----------------------------------------------------------------------
    // 2e. Subscriptions
    // -----------------------------------------------------------------------

    /// Subscribes `callback` to changes of one key or of all keys.
    ///
    /// The callback runs synchronously on the mutating thread, after the new
    /// value is committed. It may read through [`Registry::get`], but any
    /// write to this registry from inside it (`set`, `set_value`,
    /// `reset_to_default`, a managed refresh) fails with
    /// [`RegistryError::Reentrant`], whatever key it targets. A write to another
    /// key would take that key's lock while this one is held, and two such
    /// callbacks on different threads could wait on each other.
    pub fn subscribe<F>(
        &self,
        filter: impl Into<KeyFilter>,
        callback: F,
    ) -> Result<Subscription, RegistryError>
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let filter = filter.into();
        let table = self.table()?;
        if let KeyFilter::Key(key) = &filter {
            table.slot(key)?;
        }
        Ok(self.observers.subscribe(filter, Arc::new(callback)))
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }
}
