//! Error types for settle-store.

use std::path::PathBuf;

use thiserror::Error;

use settle_core::{BackendError, RegistryError};

/// All errors that can arise from the filesystem adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The local preference file exists but is not a flat YAML mapping.
    #[error("failed to parse preference store at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON managed profile could not be parsed as a flat object.
    #[error("failed to parse managed profile at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A property-list managed profile could not be read.
    #[error("failed to read managed profile at {path}: {source}")]
    Plist {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },

    /// The managed profile's top level is not a dictionary.
    #[error("managed profile at {path} is not a dictionary")]
    NotADictionary { path: PathBuf },

    /// `config.yaml` exists but does not match [`crate::StoreConfig`].
    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.settle/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        BackendError::new(err)
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
