//! Store configuration: `~/.settle/config.yaml`.
//!
//! Every field is optional; an absent file yields [`StoreConfig::default`].
//!
//! ```yaml
//! namespace: com.settle.support
//! local_store: /Users/me/.settle/prefs/com.settle.support.yaml
//! managed_profile: /Library/Managed Preferences/com.settle.support.plist
//! managed_format: plist
//! watch_managed: true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::managed::{ManagedProfileFile, ProfileFormat};
use crate::paths;

pub const DEFAULT_NAMESPACE: &str = "com.settle.support";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prefix for stored keys and the base name of both files.
    pub namespace: String,
    pub local_store: Option<PathBuf>,
    pub managed_profile: Option<PathBuf>,
    /// Overrides the format inferred from `managed_profile`'s extension.
    pub managed_format: Option<ProfileFormat>,
    /// Re-read the managed profile whenever it changes on disk.
    pub watch_managed: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            local_store: None,
            managed_profile: None,
            managed_format: None,
            watch_managed: false,
        }
    }
}

impl StoreConfig {
    pub fn load_at(home: &Path) -> Result<Self, StoreError> {
        let path = paths::config_path(home);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => return Err(io_err(&path, err)),
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| StoreError::Config { path, source })
    }

    pub fn load() -> Result<Self, StoreError> {
        Self::load_at(&paths::home()?)
    }

    pub fn local_store_path(&self, home: &Path) -> PathBuf {
        self.local_store
            .clone()
            .unwrap_or_else(|| paths::local_store_path(home, &self.namespace))
    }

    pub fn managed_profile_path(&self) -> PathBuf {
        self.managed_profile
            .clone()
            .unwrap_or_else(|| paths::managed_profile_path(&self.namespace))
    }

    pub fn managed_source(&self) -> ManagedProfileFile {
        let path = self.managed_profile_path();
        let format = self
            .managed_format
            .unwrap_or_else(|| ProfileFormat::from_path(&path));
        ManagedProfileFile::new(path, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(home: &TempDir, yaml: &str) {
        let path = paths::config_path(home.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, yaml).unwrap();
    }

    #[test]
    fn missing_config_is_default() {
        let home = TempDir::new().unwrap();
        let config = StoreConfig::load_at(home.path()).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert!(!config.watch_managed);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let home = TempDir::new().unwrap();
        write_config(&home, "namespace: com.example.helpdesk\n");
        let config = StoreConfig::load_at(home.path()).unwrap();

        assert_eq!(config.namespace, "com.example.helpdesk");
        assert_eq!(
            config.local_store_path(home.path()),
            home.path().join(".settle/prefs/com.example.helpdesk.yaml")
        );
        assert_eq!(
            config.managed_profile_path(),
            Path::new("/Library/Managed Preferences/com.example.helpdesk.plist")
        );
    }

    #[test]
    fn managed_format_inferred_unless_set() {
        let mut config = StoreConfig {
            managed_profile: Some(PathBuf::from("/etc/settle/overrides.json")),
            ..StoreConfig::default()
        };
        assert_eq!(config.managed_source().format(), ProfileFormat::Json);

        config.managed_format = Some(ProfileFormat::Plist);
        assert_eq!(config.managed_source().format(), ProfileFormat::Plist);
    }

    #[test]
    fn unknown_format_is_config_error() {
        let home = TempDir::new().unwrap();
        write_config(&home, "managed_format: toml\n");
        let err = StoreConfig::load_at(home.path()).unwrap_err();
        assert!(matches!(err, StoreError::Config { .. }), "got {err:?}");
    }
}
