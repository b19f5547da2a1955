//! Descriptor builder
//!
//! Turns host model definitions and explicitly declared callable signatures
//! into descriptors. Cross-model references are resolved optimistically
//! through the registry and left pending otherwise.

mod action;
mod model;

pub use action::{ActionSpec, FilterSpec, build_action, build_filter};
pub use model::{build_model, build_static_model};

use crate::core::descriptor::ParameterDescriptor;
use crate::core::field::{FieldType, FieldValue};
use crate::registry::ModelRegistry;

/// Declared type of an action/filter parameter or return value
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterType {
    pub kind: FieldType,
    pub doc: Option<String>,
    pub length: Option<usize>,
    pub is_array: bool,
    pub choice_list: Option<Vec<FieldValue>>,
    pub allowed_scheme_list: Option<Vec<String>>,
    /// Target model identifier, Model parameters only
    pub model: Option<String>,
}

impl ParameterType {
    pub fn new(kind: FieldType) -> Self {
        Self {
            kind,
            doc: None,
            length: None,
            is_array: false,
            choice_list: None,
            allowed_scheme_list: None,
            model: None,
        }
    }

    /// Reference to the model registered as `identifier`
    pub fn model(identifier: impl Into<String>) -> Self {
        Self {
            model: Some(identifier.into()),
            ..Self::new(FieldType::Model)
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn choices(mut self, choices: Vec<FieldValue>) -> Self {
        self.choice_list = Some(choices);
        self
    }

    pub fn schemes(mut self, schemes: &[&str]) -> Self {
        self.allowed_scheme_list = Some(schemes.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Bind the declared type to a parameter name and optional default
    pub(crate) fn to_parameter(
        &self,
        name: &str,
        default: Option<FieldValue>,
        registry: &ModelRegistry,
    ) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            doc: self.doc.clone(),
            kind: self.kind,
            required: default.is_none(),
            default,
            length: self.length,
            choice_list: self.choice_list.clone(),
            is_array: self.is_array,
            model: self
                .model
                .as_deref()
                .map(|identifier| registry.reference(identifier)),
            allowed_scheme_list: self.allowed_scheme_list.clone(),
        }
    }
}

impl From<FieldType> for ParameterType {
    fn from(kind: FieldType) -> Self {
        Self::new(kind)
    }
}
