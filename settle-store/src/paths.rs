use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub const SETTLE_DIR: &str = ".settle";
pub const CONFIG_FILE: &str = "config.yaml";
pub const MANAGED_PREFERENCES_DIR: &str = "/Library/Managed Preferences";

pub fn settle_root(home: &Path) -> PathBuf {
    home.join(SETTLE_DIR)
}

pub fn config_path(home: &Path) -> PathBuf {
    settle_root(home).join(CONFIG_FILE)
}

pub fn prefs_dir(home: &Path) -> PathBuf {
    settle_root(home).join("prefs")
}

/// `<home>/.settle/prefs/<namespace>.yaml`
pub fn local_store_path(home: &Path, namespace: &str) -> PathBuf {
    prefs_dir(home).join(format!("{namespace}.yaml"))
}

/// `/Library/Managed Preferences/<namespace>.plist`
pub fn managed_profile_path(namespace: &str) -> PathBuf {
    Path::new(MANAGED_PREFERENCES_DIR).join(format!("{namespace}.plist"))
}

pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}
