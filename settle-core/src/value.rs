//! Value model: declared types, typed values, raw collaborator values, tiers.
//!
//! Collaborators (persistent backends, managed sources) hand the registry
//! [`RawValue`]s. The registry only ever surfaces [`Value`]s whose type matches
//! the key's declaration; anything else decodes to `None` and is treated as
//! absent at its tier.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Declared types
// ---------------------------------------------------------------------------

/// The declared type of a preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Bool,
    Int,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed values
// ---------------------------------------------------------------------------

/// A well-typed preference value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bool(b) => b.fmt(f),
            Value::Int(i) => i.fmt(f),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

/// Conversion from a resolved [`Value`] into a concrete Rust type.
///
/// Implemented for the three declared types so [`crate::TypedKey`] can hand
/// back `String`, `bool` or `i64` directly.
pub trait FromValue: Sized {
    const VALUE_TYPE: ValueType;

    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for String {
    const VALUE_TYPE: ValueType = ValueType::String;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const VALUE_TYPE: ValueType = ValueType::Bool;

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    const VALUE_TYPE: ValueType = ValueType::Int;

    fn from_value(value: Value) -> Option<Self> {
        value.as_int()
    }
}

// ---------------------------------------------------------------------------
// Raw values
// ---------------------------------------------------------------------------

/// A scalar as read back from a collaborator, before type checking.
///
/// Anything that is not a bool, integer, float or string (sequences, maps,
/// nulls, dates) lands in [`RawValue::Other`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Other(serde_json::Value),
}

impl RawValue {
    /// Decode into a [`Value`] of `expected` type. Strict: no coercion between
    /// strings, numbers and booleans.
    pub fn decode(&self, expected: ValueType) -> Option<Value> {
        match (self, expected) {
            (RawValue::String(s), ValueType::String) => Some(Value::String(s.clone())),
            (RawValue::Bool(b), ValueType::Bool) => Some(Value::Bool(*b)),
            (RawValue::Int(i), ValueType::Int) => Some(Value::Int(*i)),
            _ => None,
        }
    }

    /// Short name of the raw kind, for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Bool(_) => "bool",
            RawValue::Int(_) => "int",
            RawValue::Float(_) => "float",
            RawValue::String(_) => "string",
            RawValue::Other(_) => "other",
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => RawValue::String(s),
            Value::Bool(b) => RawValue::Bool(b),
            Value::Int(i) => RawValue::Int(i),
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        RawValue::from(value.clone())
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Int(i)
    }
}

impl From<i32> for RawValue {
    fn from(i: i32) -> Self {
        RawValue::Int(i64::from(i))
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::String(s.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::String(s)
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        RawValue::Float(f)
    }
}

// ---------------------------------------------------------------------------
// Tiers and effective values
// ---------------------------------------------------------------------------

/// Source tier of an effective value, highest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Managed,
    Local,
    Default,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Managed => write!(f, "managed"),
            Tier::Local => write!(f, "local"),
            Tier::Default => write!(f, "default"),
        }
    }
}

/// The resolved value of a key, tagged with the tier that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveValue {
    pub value: Value,
    pub tier: Tier,
}

impl EffectiveValue {
    pub fn new(value: Value, tier: Tier) -> Self {
        Self { value, tier }
    }

    /// Equal values from different tiers count as the same effective value.
    pub fn same_value(&self, other: &EffectiveValue) -> bool {
        self.value == other.value
    }
}

impl fmt::Display for EffectiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.tier)
    }
}
