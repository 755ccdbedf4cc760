//! Wires the filesystem adapters into a live [`Registry`].

use std::path::Path;
use std::sync::Arc;

use settle_core::{KeyDefinition, Registry};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::paths;
use crate::watch::ManagedProfileWatcher;
use crate::yaml_backend::YamlFileBackend;

/// A registered registry plus the watcher feeding its managed tier, if any.
#[derive(Debug)]
pub struct Bootstrapped {
    pub registry: Arc<Registry>,
    pub watcher: Option<ManagedProfileWatcher>,
}

/// Opens the local store, registers `defs`, starts the watcher when
/// `config.watch_managed` is set, then applies the managed profile once.
/// The profile's directory does not need to exist for watching to start.
///
/// An unreadable profile at startup is logged and treated as "nothing
/// managed"; the next successful reload applies it.
pub fn open_registry_at<I>(
    home: &Path,
    config: &StoreConfig,
    defs: I,
) -> Result<Bootstrapped, StoreError>
where
    I: IntoIterator<Item = KeyDefinition>,
{
    let backend = YamlFileBackend::open_path(config.local_store_path(home))?;
    let registry = Arc::new(Registry::new(Arc::new(backend), config.namespace.clone()));
    registry.register(defs)?;

    // Watch before the initial read: a write between the two must still raise an event.
    let source = config.managed_source();
    let watcher = if config.watch_managed {
        Some(ManagedProfileWatcher::start(Arc::clone(&registry), source.clone())?)
    } else {
        None
    };

    match registry.refresh_from(&source) {
        Ok(changed) => tracing::debug!(
            path = %source.path().display(),
            changed = changed.len(),
            "initial managed profile applied"
        ),
        Err(err) => tracing::warn!(
            path = %source.path().display(),
            error = %err,
            "initial managed profile unreadable; continuing without overrides"
        ),
    }

    tracing::info!(
        namespace = %config.namespace,
        watching = watcher.is_some(),
        "preference registry ready"
    );
    Ok(Bootstrapped { registry, watcher })
}

/// [`open_registry_at`] under the user's home with `~/.settle/config.yaml`.
pub fn open_registry<I>(defs: I) -> Result<Bootstrapped, StoreError>
where
    I: IntoIterator<Item = KeyDefinition>,
{
    let home = paths::home()?;
    let config = StoreConfig::load_at(&home)?;
    open_registry_at(&home, &config, defs)
}
