//! Change subscriptions and synchronous fan-out.
//!
//! Dispatch order is registration order. Each callback runs isolated: a panic
//! in one subscriber is logged and the remaining subscribers still receive the
//! event.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::value::EffectiveValue;

/// Callback invoked on the mutating thread for every matching change.
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Which keys a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    Key(String),
    All,
}

impl KeyFilter {
    pub fn key(key: impl Into<String>) -> Self {
        KeyFilter::Key(key.into())
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyFilter::Key(k) => k == key,
            KeyFilter::All => true,
        }
    }
}

impl From<&str> for KeyFilter {
    fn from(key: &str) -> Self {
        KeyFilter::Key(key.to_owned())
    }
}

/// One effective-value change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
    pub old: EffectiveValue,
    pub new: EffectiveValue,
}

struct Entry {
    id: u64,
    filter: KeyFilter,
    callback: ChangeCallback,
}

/// Subscriber registry owned by the [`crate::Registry`].
#[derive(Default)]
pub struct ObserverSet {
    entries: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl ObserverSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds a subscriber; the returned token removes it when dropped.
    pub fn subscribe(self: &Arc<Self>, filter: KeyFilter, callback: ChangeCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push(Entry {
            id,
            filter,
            callback,
        });
        Subscription {
            id,
            set: Arc::downgrade(self),
            active: true,
        }
    }

    /// Returns `true` if a subscription with `id` was removed.
    pub fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Delivers `event` to every matching subscriber. Returns how many
    /// callbacks completed without panicking.
    ///
    /// The subscriber list is snapshotted first, so callbacks may subscribe or
    /// unsubscribe while being dispatched to.
    pub fn dispatch(&self, event: &ChangeEvent) -> usize {
        let targets: Vec<(u64, ChangeCallback)> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.filter.matches(&event.key))
            .map(|e| (e.id, Arc::clone(&e.callback)))
            .collect();

        let mut delivered = 0;
        for (id, callback) in targets {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => tracing::error!(
                    subscriber = id,
                    key = %event.key,
                    panic = panic_message(payload.as_ref()),
                    "change subscriber panicked; continuing with remaining subscribers",
                ),
            }
        }
        tracing::debug!(key = %event.key, delivered, old = %event.old, new = %event.new, "change dispatched");
        delivered
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Removal token for a subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes it"]
pub struct Subscription {
    id: u64,
    set: Weak<ObserverSet>,
    active: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the subscription now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keeps the subscription alive for as long as its registry lives.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
