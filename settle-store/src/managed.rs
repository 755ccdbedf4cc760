//! Managed profile reader: the administrator-owned override file.
//!
//! The profile is a flat dictionary of key name to scalar, delivered either
//! as a property list (the MDM payload format) or as JSON. Keys are plain
//! preference names; the namespace is the file name. The registry decides
//! what to do with unknown keys and mistyped values, so this reader keeps
//! every entry it finds and maps non-scalars to [`RawValue::Other`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use settle_core::{BackendError, ManagedOverrideSource, ManagedSnapshot, RawValue};

use crate::error::{io_err, StoreError};
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileFormat {
    /// XML or binary property list.
    #[default]
    Plist,
    Json,
}

impl ProfileFormat {
    /// `.json` is JSON; anything else is read as a property list.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ProfileFormat::Json,
            _ => ProfileFormat::Plist,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManagedProfileFile {
    path: PathBuf,
    format: ProfileFormat,
}

impl ManagedProfileFile {
    pub fn new(path: impl Into<PathBuf>, format: ProfileFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Format inferred from the file extension.
    pub fn detect(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = ProfileFormat::from_path(&path);
        Self { path, format }
    }

    /// The system profile for `namespace` under `/Library/Managed Preferences`.
    pub fn system(namespace: &str) -> Self {
        Self::new(paths::managed_profile_path(namespace), ProfileFormat::Plist)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ProfileFormat {
        self.format
    }

    /// Reads the profile. An absent file means nothing is managed.
    pub fn read(&self) -> Result<ManagedSnapshot, StoreError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no managed profile present");
            return Ok(ManagedSnapshot::empty());
        }
        let values = match self.format {
            ProfileFormat::Plist => read_plist(&self.path)?,
            ProfileFormat::Json => read_json(&self.path)?,
        };
        tracing::debug!(
            path = %self.path.display(),
            entries = values.len(),
            "read managed profile"
        );
        Ok(ManagedSnapshot::new(values))
    }
}

impl ManagedOverrideSource for ManagedProfileFile {
    fn snapshot(&self) -> Result<ManagedSnapshot, BackendError> {
        Ok(self.read()?)
    }
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

fn read_plist(path: &Path) -> Result<BTreeMap<String, RawValue>, StoreError> {
    let root = plist::Value::from_file(path).map_err(|source| StoreError::Plist {
        path: path.to_path_buf(),
        source,
    })?;
    let dict = root
        .into_dictionary()
        .ok_or_else(|| StoreError::NotADictionary {
            path: path.to_path_buf(),
        })?;
    Ok(dict
        .into_iter()
        .map(|(key, value)| (key, raw_from_plist(value)))
        .collect())
}

fn raw_from_plist(value: plist::Value) -> RawValue {
    match value {
        plist::Value::Boolean(b) => RawValue::Bool(b),
        plist::Value::Integer(n) => match n.as_signed() {
            Some(n) => RawValue::Int(n),
            None => RawValue::Other(serde_json::Value::from(n.as_unsigned().unwrap_or(u64::MAX))),
        },
        plist::Value::Real(f) => RawValue::Float(f),
        plist::Value::String(s) => RawValue::String(s),
        plist::Value::Array(_) => opaque("array"),
        plist::Value::Dictionary(_) => opaque("dictionary"),
        plist::Value::Data(_) => opaque("data"),
        plist::Value::Date(_) => opaque("date"),
        _ => opaque("unsupported"),
    }
}

fn opaque(kind: &str) -> RawValue {
    RawValue::Other(serde_json::Value::String(format!("<plist {kind}>")))
}

fn read_json(path: &Path) -> Result<BTreeMap<String, RawValue>, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let root: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    let serde_json::Value::Object(map) = root else {
        return Err(StoreError::NotADictionary {
            path: path.to_path_buf(),
        });
    };
    map.into_iter()
        .map(|(key, value)| {
            let raw = serde_json::from_value(value).map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })?;
            Ok((key, raw))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("com.example.support.plist", ProfileFormat::Plist)]
    #[case("overrides.json", ProfileFormat::Json)]
    #[case("OVERRIDES.JSON", ProfileFormat::Json)]
    #[case("no-extension", ProfileFormat::Plist)]
    fn format_from_extension(#[case] name: &str, #[case] expected: ProfileFormat) {
        assert_eq!(ProfileFormat::from_path(Path::new(name)), expected);
    }

    #[test]
    fn plist_scalars_map_to_raw_values() {
        assert_eq!(raw_from_plist(plist::Value::Boolean(true)), RawValue::Bool(true));
        assert_eq!(raw_from_plist(plist::Value::Integer(7i64.into())), RawValue::Int(7));
        assert_eq!(raw_from_plist(plist::Value::Real(1.5)), RawValue::Float(1.5));
        assert_eq!(
            raw_from_plist(plist::Value::String("Help".into())),
            RawValue::String("Help".into())
        );
    }

    #[test]
    fn plist_containers_are_opaque() {
        let raw = raw_from_plist(plist::Value::Array(vec![plist::Value::Boolean(true)]));
        assert_eq!(raw.kind(), "other");
    }

    #[test]
    fn system_profile_path() {
        let profile = ManagedProfileFile::system("com.example.support");
        assert_eq!(
            profile.path(),
            Path::new("/Library/Managed Preferences/com.example.support.plist")
        );
        assert_eq!(profile.format(), ProfileFormat::Plist);
    }
}
