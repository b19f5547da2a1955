//! Field, parameter, action and model descriptors
//!
//! Descriptors are the protocol-neutral metadata the server layer navigates.
//! They are built once at registration time and shared read-only afterwards.

use crate::core::auth::Verb;
use crate::core::field::{FieldType, FieldValue, Mode, ValueMap};
use crate::core::store::{Instance, QuerySet, Session};
use crate::transaction::TransactionClass;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// How long the caller may cache DESCRIBE output, in seconds
pub const DEFAULT_CACHE_LENGTH: u64 = 3600;

/// Reference from a field or parameter to another model
///
/// References that could not be resolved while the target model was not yet
/// registered stay `Pending` until the registry is finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef {
    Resolved { identifier: String, path: String },
    Pending { identifier: String },
}

impl ModelRef {
    pub fn pending(identifier: impl Into<String>) -> Self {
        ModelRef::Pending {
            identifier: identifier.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            ModelRef::Resolved { identifier, .. } | ModelRef::Pending { identifier } => {
                identifier
            }
        }
    }

    /// Wire path of the target, once resolved
    pub fn path(&self) -> Option<&str> {
        match self {
            ModelRef::Resolved { path, .. } => Some(path),
            ModelRef::Pending { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ModelRef::Pending { .. })
    }
}

impl Serialize for ModelRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ModelRef::Resolved { path, .. } => serializer.serialize_str(path),
            ModelRef::Pending { identifier } => serializer.serialize_str(identifier),
        }
    }
}

/// One action/filter input, return value, or the shared part of a field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice_list: Option<Vec<FieldValue>>,
    pub is_array: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_scheme_list: Option<Vec<String>>,
}

impl ParameterDescriptor {
    /// Required, single-valued parameter without constraints
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            doc: None,
            kind,
            required: true,
            default: None,
            length: None,
            choice_list: None,
            is_array: false,
            model: None,
            allowed_scheme_list: None,
        }
    }
}

/// A persisted attribute or computed property of a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    #[serde(flatten)]
    pub parameter: ParameterDescriptor,
    pub mode: Mode,
    /// `false` for computed properties with no store column
    #[serde(skip)]
    pub persisted: bool,
}

impl Deref for FieldDescriptor {
    type Target = ParameterDescriptor;

    fn deref(&self) -> &Self::Target {
        &self.parameter
    }
}

impl DerefMut for FieldDescriptor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.parameter
    }
}

impl FieldDescriptor {
    /// Multi-valued reference, whose associations need a saved instance
    pub fn is_related_set(&self) -> bool {
        self.persisted && self.kind == FieldType::Model && self.is_array
    }
}

/// Arguments handed to an action callable
pub struct ActionContext<'a> {
    pub session: &'a mut dyn Session,
    /// `None` for static actions
    pub target: Option<&'a mut Instance>,
    /// Every declared parameter, defaults filled in
    pub args: &'a ValueMap,
}

/// Host callable behind an action
pub type ActionFn =
    Arc<dyn Fn(ActionContext<'_>) -> anyhow::Result<Option<FieldValue>> + Send + Sync>;

/// Host callable behind a named list filter
pub type FilterFn =
    Arc<dyn Fn(&mut dyn Session, &ValueMap) -> anyhow::Result<QuerySet> + Send + Sync>;

/// A custom verb exposed on a model
#[derive(Clone)]
pub struct ActionDescriptor {
    pub name: String,
    pub doc: Option<String>,
    /// Operates without a target instance
    pub is_static: bool,
    pub parameter_list: Vec<ParameterDescriptor>,
    pub return_parameter: Option<ParameterDescriptor>,
    pub func: ActionFn,
}

impl ActionDescriptor {
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameter_list.iter().find(|param| param.name == name)
    }

    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "doc": self.doc,
            "static": self.is_static,
            "parameters": self.parameter_list,
            "return": self.return_parameter,
        })
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("is_static", &self.is_static)
            .field("parameter_list", &self.parameter_list)
            .field("return_parameter", &self.return_parameter)
            .finish_non_exhaustive()
    }
}

/// A named list filter: callable plus its ordered parameters
#[derive(Clone)]
pub struct ListFilter {
    pub func: FilterFn,
    pub parameter_map: IndexMap<String, ParameterDescriptor>,
}

impl fmt::Debug for ListFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListFilter")
            .field("parameter_map", &self.parameter_map)
            .finish_non_exhaustive()
    }
}

/// Metadata describing one persisted entity type
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Fully-qualified registry identifier (`module.Name`)
    pub identifier: String,
    pub name: String,
    /// Namespace-scoped wire path
    pub path: String,
    pub doc: Option<String>,
    pub field_map: IndexMap<String, FieldDescriptor>,
    pub constant_set_map: IndexMap<String, Vec<String>>,
    pub not_allowed_verb_list: BTreeSet<Verb>,
    pub list_filter_map: IndexMap<String, ListFilter>,
    pub transaction_class: TransactionClass,
    pub action_list: Vec<ActionDescriptor>,
    pub cache_length: u64,
}

impl ModelDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_map.get(name)
    }

    pub fn action(&self, name: &str) -> Option<&ActionDescriptor> {
        self.action_list.iter().find(|action| action.name == name)
    }

    pub fn allows(&self, verb: Verb) -> bool {
        !self.not_allowed_verb_list.contains(&verb)
    }

    /// Navigable metadata for DESCRIBE
    pub fn describe(&self) -> serde_json::Value {
        let filters: serde_json::Map<String, serde_json::Value> = self
            .list_filter_map
            .iter()
            .map(|(name, filter)| {
                let params: Vec<&ParameterDescriptor> = filter.parameter_map.values().collect();
                (name.clone(), serde_json::json!(params))
            })
            .collect();

        serde_json::json!({
            "name": self.name,
            "path": self.path,
            "doc": self.doc,
            "fields": self.field_map.values().collect::<Vec<_>>(),
            "constants": self.constant_set_map,
            "not_allowed_verbs": self.not_allowed_verb_list,
            "list_filters": filters,
            "actions": self.action_list.iter().map(ActionDescriptor::describe).collect::<Vec<_>>(),
            "cache_length": self.cache_length,
        })
    }
}
