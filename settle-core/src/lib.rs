//! settle core library: typed preference registry with managed overrides.
//!
//! Public API surface:
//! - [`definition`]: static [`KeyDefinition`]s and [`TypedKey`] handles
//! - [`value`]: declared types, values, raw collaborator values, tiers
//! - [`backend`]: [`PersistentBackend`] / [`ManagedOverrideSource`] and in-memory adapters
//! - [`observer`]: subscriptions and change fan-out
//! - [`registry`]: the [`Registry`] itself
//! - [`catalog`]: the support application's preference table
//! - [`error`]: [`RegistryError`], [`BackendError`]

pub mod backend;
pub mod catalog;
pub mod definition;
pub mod error;
pub mod observer;
pub mod registry;
pub mod value;

pub use backend::{
    ManagedOverrideSource, ManagedSnapshot, MemoryBackend, PersistentBackend, StaticSource,
};
pub use definition::{DefaultValue, KeyDefinition, KeyScope, TypedKey};
pub use error::{BackendError, RegistryError};
pub use observer::{ChangeEvent, KeyFilter, Subscription};
pub use registry::Registry;
pub use value::{EffectiveValue, FromValue, RawValue, Tier, Value, ValueType};
