//! Field value types shared by descriptors, the converter and stores

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// A store-native value
///
/// This is what host stores read and write. The converter translates these
/// to and from wire values according to a field or parameter descriptor.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Map(serde_json::Map<String, serde_json::Value>),
    File(FileValue),
    /// Reference to another model instance by primary key
    Reference(Reference),
    /// Multi-valued field (arrays, many-to-many association sets)
    List(Vec<FieldValue>),
    Null,
}

/// Field or parameter name → store-native value, in caller order
pub type ValueMap = IndexMap<String, FieldValue>;

/// Reference to a model instance, as produced when a model token is resolved
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Reference {
    /// Registry identifier of the referenced model
    pub model: String,
    /// Primary key of the referenced instance
    pub key: Box<FieldValue>,
}

impl Reference {
    pub fn new(model: impl Into<String>, key: FieldValue) -> Self {
        Self {
            model: model.into(),
            key: Box::new(key),
        }
    }
}

/// A file held by a field or parameter
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FileValue {
    /// Saved by the store, reachable through `url`
    Stored { name: String, url: String },
    /// Wrapped upload that was never handed to the store
    Detached { name: String, content: Vec<u8> },
}

impl FileValue {
    pub fn name(&self) -> &str {
        match self {
            FileValue::Stored { name, .. } | FileValue::Detached { name, .. } => name,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            FileValue::Stored { url, .. } => Some(url),
            FileValue::Detached { .. } => None,
        }
    }
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Strip a reference down to the primary key it points at
    pub fn into_key(self) -> FieldValue {
        match self {
            FieldValue::Reference(reference) => *reference.key,
            other => other,
        }
    }

    /// Deterministic ordering used for primary keys
    ///
    /// Integers compare numerically, everything else by natural string form,
    /// and integers sort before non-integers.
    pub fn key_cmp(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::Integer(_), _) => Ordering::Less,
            (_, FieldValue::Integer(_)) => Ordering::Greater,
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }
}

/// Natural string form, used for primary keys in wire tokens
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Uuid(u) => write!(f, "{}", u),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            FieldValue::Map(map) => write!(f, "{}", serde_json::Value::Object(map.clone())),
            FieldValue::File(file) => write!(f, "{}", file.name()),
            FieldValue::Reference(reference) => write!(f, "{}", reference.key),
            FieldValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// The adapter's type vocabulary for fields and parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    Map,
    File,
    Model,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "String",
            FieldType::Integer => "Integer",
            FieldType::Float => "Float",
            FieldType::Boolean => "Boolean",
            FieldType::DateTime => "DateTime",
            FieldType::Map => "Map",
            FieldType::File => "File",
            FieldType::Model => "Model",
        };
        write!(f, "{}", name)
    }
}

/// Access policy on a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "RW")]
    ReadWrite,
    #[serde(rename = "RO")]
    ReadOnly,
    /// Settable at creation, immutable after
    #[serde(rename = "RC")]
    ReadCreateOnly,
}

impl Mode {
    /// Whether a value may be supplied on CREATE
    pub fn allows_create(self) -> bool {
        !matches!(self, Mode::ReadOnly)
    }

    /// Whether a value may be supplied on UPDATE
    pub fn allows_update(self) -> bool {
        matches!(self, Mode::ReadWrite)
    }
}

/// File content supplied by a caller
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub content: Vec<u8>,
    pub filename: Option<String>,
}

impl FileUpload {
    pub fn new(content: impl Into<Vec<u8>>, filename: Option<&str>) -> Self {
        Self {
            content: content.into(),
            filename: filename.map(str::to_string),
        }
    }
}

/// An inbound wire value, as decoded by the protocol layer
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// Any JSON-representable scalar, map, list or null
    Json(serde_json::Value),
    /// Uploaded file content
    File(FileUpload),
    /// List of non-JSON values (e.g. several uploads)
    List(Vec<WireValue>),
}

impl From<serde_json::Value> for WireValue {
    fn from(value: serde_json::Value) -> Self {
        WireValue::Json(value)
    }
}

impl From<FileUpload> for WireValue {
    fn from(upload: FileUpload) -> Self {
        WireValue::File(upload)
    }
}
