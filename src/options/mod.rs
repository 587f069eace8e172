//! Option model and merge engine
//!
//! One build's configuration is merged from three layers: the built-in
//! default resource (lowest precedence), invocation-time overrides from
//! the caller, and the project's `pandoc-config.json` (highest). Scalar
//! and map options override layer by layer; the designated accumulating
//! options concatenate across all layers instead.

pub mod merge;
pub mod project;
pub mod schema;

use indexmap::IndexMap;
use serde_json::Value;

pub use merge::{expand_from_format, merge, ConfigSource, EffectiveOptions, Layer, LayerOrigin};

/// The merged option mapping for one build, in canonical iteration order.
pub type OptionSet = IndexMap<String, OptionValue>;

/// A single option value, tagged by shape.
///
/// The serialization family (how a value becomes command-line tokens) is
/// carried by the schema, not re-inferred from the value at synthesis
/// time; this type only distinguishes the shapes a JSON layer can supply.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Boolean switch. `false` is the inert default and is never emitted.
    Flag(bool),
    /// String scalar. Empty is inert.
    Str(String),
    /// Integer scalar. Always emitted, including zero.
    Int(i64),
    /// Ordered list of strings. Empty is inert.
    List(Vec<String>),
    /// Variables map, insertion-ordered.
    Map(IndexMap<String, VarValue>),
}

/// A value inside the variables map.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Str(String),
    List(Vec<String>),
    Bool(bool),
}

/// Serialization family for an option, fixed by the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Plain boolean flag: `--name` when true, omitted when false.
    Switch,
    /// Numeric-valued option (`toc-depth` and friends): emitted as
    /// `--name=N`, never as a bare boolean switch.
    Numeric,
    /// Scalar emitted as `--name=value`.
    Scalar,
    /// Scalar resolved through the path resolver (`template`).
    PathScalar,
    /// Accumulating list emitted once as `--name=v1,v2,...`.
    CommaList,
    /// Accumulating list of file references, one resolved token per item.
    PathList,
    /// Accumulating variables map, one `--variable=k:v` per entry.
    VariableMap,
}

impl Family {
    /// Whether values from multiple layers concatenate instead of override.
    pub fn is_accumulating(self) -> bool {
        matches!(
            self,
            Family::CommaList | Family::PathList | Family::VariableMap
        )
    }
}

/// Configuration errors. These abort the current build only.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {message}")]
    Io { path: String, message: String },

    #[error("could not parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("option {option} should be a {expected}, got {found}")]
    TypeMismatch {
        option: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{section} should be an object")]
    NotAnObject { section: String },
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

impl OptionValue {
    /// Convert a JSON layer value into a typed option value.
    pub fn from_json(option: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Null => Ok(OptionValue::Flag(false)),
            Value::Bool(b) => Ok(OptionValue::Flag(*b)),
            Value::String(s) => Ok(OptionValue::Str(s.clone())),
            Value::Number(n) => Ok(n
                .as_i64()
                .map(OptionValue::Int)
                .unwrap_or_else(|| OptionValue::Str(n.to_string()))),
            Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    list.push(scalar_to_string(option, item)?);
                }
                Ok(OptionValue::List(list))
            }
            Value::Object(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, raw) in entries {
                    map.insert(key.clone(), VarValue::from_json(option, raw)?);
                }
                Ok(OptionValue::Map(map))
            }
        }
    }

    /// Serialize back to JSON, for the `defaults` display command.
    pub fn to_json(&self) -> Value {
        match self {
            OptionValue::Flag(b) => Value::Bool(*b),
            OptionValue::Str(s) => Value::String(s.clone()),
            OptionValue::Int(i) => Value::from(*i),
            OptionValue::List(items) => {
                Value::Array(items.iter().map(|s| Value::String(s.clone())).collect())
            }
            OptionValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl VarValue {
    fn from_json(option: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Bool(b) => Ok(VarValue::Bool(*b)),
            Value::String(s) => Ok(VarValue::Str(s.clone())),
            Value::Number(n) => Ok(VarValue::Str(n.to_string())),
            Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    list.push(scalar_to_string(option, item)?);
                }
                Ok(VarValue::List(list))
            }
            other => Err(ConfigError::TypeMismatch {
                option: option.to_string(),
                expected: "scalar or list",
                found: json_type_name(other),
            }),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            VarValue::Str(s) => Value::String(s.clone()),
            VarValue::List(items) => {
                Value::Array(items.iter().map(|s| Value::String(s.clone())).collect())
            }
            VarValue::Bool(b) => Value::Bool(*b),
        }
    }
}

fn scalar_to_string(option: &str, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ConfigError::TypeMismatch {
            option: option.to_string(),
            expected: "list of strings",
            found: json_type_name(other),
        }),
    }
}
