//! Filesystem adapters for `settle-core`.
//!
//! - [`yaml_backend`]: [`YamlFileBackend`], the local tier on disk
//! - [`managed`]: [`ManagedProfileFile`], the administrator's profile
//! - [`watch`]: [`ManagedProfileWatcher`], reloads the profile on change
//! - [`config`]: [`StoreConfig`] from `~/.settle/config.yaml`
//! - [`bootstrap`]: [`open_registry_at`] ties them together

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod managed;
pub mod paths;
pub mod watch;
pub mod yaml_backend;

pub use bootstrap::{open_registry, open_registry_at, Bootstrapped};
pub use config::StoreConfig;
pub use error::StoreError;
pub use managed::{ManagedProfileFile, ProfileFormat};
pub use watch::ManagedProfileWatcher;
pub use yaml_backend::YamlFileBackend;
