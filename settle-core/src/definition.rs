//! Static key definitions and typed key handles.
//!
//! A [`KeyDefinition`] is compiled-in data. Its declared type is derived from
//! its default, so the two can never disagree.

use std::fmt;
use std::marker::PhantomData;

use crate::value::{FromValue, Value, ValueType};

/// Compile-time default of a preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    String(&'static str),
    Bool(bool),
    Int(i64),
}

impl DefaultValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            DefaultValue::String(_) => ValueType::String,
            DefaultValue::Bool(_) => ValueType::Bool,
            DefaultValue::Int(_) => ValueType::Int,
        }
    }

    pub fn to_value(&self) -> Value {
        match *self {
            DefaultValue::String(s) => Value::String(s.to_owned()),
            DefaultValue::Bool(b) => Value::Bool(b),
            DefaultValue::Int(i) => Value::Int(i),
        }
    }
}

/// Whether a key may be governed by a managed override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyScope {
    #[default]
    Manageable,
    /// Handled locally only; managed snapshot entries for it are ignored.
    LocalOnly,
}

/// Static description of one preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDefinition {
    pub key: &'static str,
    pub default: DefaultValue,
    pub scope: KeyScope,
    pub summary: &'static str,
}

impl KeyDefinition {
    pub const fn string(key: &'static str, default: &'static str) -> Self {
        Self::with_default(key, DefaultValue::String(default))
    }

    pub const fn bool(key: &'static str, default: bool) -> Self {
        Self::with_default(key, DefaultValue::Bool(default))
    }

    pub const fn int(key: &'static str, default: i64) -> Self {
        Self::with_default(key, DefaultValue::Int(default))
    }

    const fn with_default(key: &'static str, default: DefaultValue) -> Self {
        Self {
            key,
            default,
            scope: KeyScope::Manageable,
            summary: "",
        }
    }

    /// Marks the key as local-only.
    pub const fn local_only(mut self) -> Self {
        self.scope = KeyScope::LocalOnly;
        self
    }

    pub const fn summary(mut self, summary: &'static str) -> Self {
        self.summary = summary;
        self
    }

    pub fn value_type(&self) -> ValueType {
        self.default.value_type()
    }

    pub fn default_value(&self) -> Value {
        self.default.to_value()
    }

    pub fn is_manageable(&self) -> bool {
        self.scope == KeyScope::Manageable
    }
}

/// Typed handle to a key, carrying its value type at compile time.
pub struct TypedKey<T: FromValue> {
    key: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromValue> Clone for TypedKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: FromValue> Copy for TypedKey<T> {}

impl<T: FromValue> fmt::Debug for TypedKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedKey")
            .field("key", &self.key)
            .field("type", &T::VALUE_TYPE)
            .finish()
    }
}

impl<T: FromValue> TypedKey<T> {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn value_type(&self) -> ValueType {
        T::VALUE_TYPE
    }
}
