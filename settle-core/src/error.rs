//! Error types for settle-core.

use std::fmt;

use thiserror::Error;

use crate::value::ValueType;

/// All errors that can arise from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The operation referenced a key with no registered definition.
    #[error("unknown preference key '{key}'")]
    UnknownKey { key: String },

    /// The caller supplied a value whose type disagrees with the definition.
    #[error("type mismatch for '{key}': expected {expected}, got {got}")]
    TypeMismatch {
        key: String,
        expected: ValueType,
        got: ValueType,
    },

    /// An operation ran before [`crate::Registry::register`] completed.
    #[error("registry is not initialized; register key definitions first")]
    NotInitialized,

    /// [`crate::Registry::register`] was called a second time.
    #[error("registry is already initialized")]
    AlreadyInitialized,

    /// Two definitions in the registered table share a key.
    #[error("duplicate key definition '{key}'")]
    DuplicateKey { key: String },

    /// An operation ran after [`crate::Registry::shutdown`].
    #[error("registry has been shut down")]
    ShutDown,

    /// A change callback tried to mutate the registry that is notifying it.
    #[error("re-entrant {operation} from within a change notification")]
    Reentrant { operation: &'static str },

    /// The persistent backend failed to store or remove a value.
    #[error("persistence backend failure: {0}")]
    BackendFailure(#[source] BackendError),

    /// The managed override source failed to produce a snapshot.
    #[error("managed override source failure: {0}")]
    ManagedSourceFailure(#[source] BackendError),
}

/// Type-erased error returned by collaborator adapters
/// ([`crate::PersistentBackend`], [`crate::ManagedOverrideSource`]).
#[derive(Debug)]
pub struct BackendError(Box<dyn std::error::Error + Send + Sync>);

impl BackendError {
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self(err.into())
    }

    /// Borrow the adapter's own error, e.g. to downcast it.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for BackendError {
    /// The adapter's own error.
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug, Error)]
    #[error("cannot write prefs.yaml")]
    struct WriteFailed(#[source] std::io::Error);

    #[test]
    fn error_chain_includes_adapter_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = RegistryError::BackendFailure(BackendError::new(WriteFailed(io)));

        let backend = err.source().expect("backend error");
        let adapter = backend.source().expect("adapter error");
        assert!(adapter.downcast_ref::<WriteFailed>().is_some());
        assert_eq!(adapter.to_string(), "cannot write prefs.yaml");
        let io = adapter.source().expect("io cause");
        assert_eq!(io.to_string(), "read-only");
    }

    #[test]
    fn display_is_the_adapter_message() {
        let err = BackendError::new("disk full");
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(err.source().map(|e| e.to_string()).as_deref(), Some("disk full"));
    }
}
