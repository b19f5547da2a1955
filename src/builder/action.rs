//! Action and list-filter descriptors from declared signatures

use super::ParameterType;
use crate::core::descriptor::{ActionContext, ActionDescriptor, ActionFn, FilterFn, ListFilter};
use crate::core::error::RegistrationError;
use crate::core::field::{FieldValue, ValueMap};
use crate::core::store::{QuerySet, Session};
use crate::registry::ModelRegistry;
use indexmap::IndexMap;
use std::sync::Arc;

/// Declaration of an action: callable plus its explicit signature
///
/// `signature` lists the callable's parameter names in order. Non-static
/// actions declare their receiver first; it is not exposed as a parameter.
/// `defaults` are the trailing default values, aligned from the end.
#[derive(Clone)]
pub struct ActionSpec {
    pub name: String,
    pub doc: Option<String>,
    pub is_static: bool,
    pub signature: Vec<String>,
    pub defaults: Vec<FieldValue>,
    pub parameter_types: Vec<ParameterType>,
    pub return_type: Option<ParameterType>,
    pub func: ActionFn,
}

impl ActionSpec {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(ActionContext<'_>) -> anyhow::Result<Option<FieldValue>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            doc: None,
            is_static: false,
            signature: Vec::new(),
            defaults: Vec::new(),
            parameter_types: Vec::new(),
            return_type: None,
            func: Arc::new(func),
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Mark the action as operating without a target instance
    pub fn static_action(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn signature(mut self, names: &[&str]) -> Self {
        self.signature = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn defaults(mut self, defaults: Vec<FieldValue>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn parameter(mut self, parameter_type: impl Into<ParameterType>) -> Self {
        self.parameter_types.push(parameter_type.into());
        self
    }

    pub fn returns(mut self, return_type: impl Into<ParameterType>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }
}

/// Declaration of a named list filter
#[derive(Clone)]
pub struct FilterSpec {
    pub name: String,
    pub signature: Vec<String>,
    pub parameter_types: Vec<ParameterType>,
    pub func: FilterFn,
}

impl FilterSpec {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut dyn Session, &ValueMap) -> anyhow::Result<QuerySet> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: Vec::new(),
            parameter_types: Vec::new(),
            func: Arc::new(func),
        }
    }

    pub fn signature(mut self, names: &[&str]) -> Self {
        self.signature = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn parameter(mut self, parameter_type: impl Into<ParameterType>) -> Self {
        self.parameter_types.push(parameter_type.into());
        self
    }
}

/// Build an action descriptor for `model`
///
/// The declared parameter types must line up 1:1 with the signature names
/// (receiver excluded), and there cannot be more defaults than parameters.
pub fn build_action(
    model: &str,
    spec: ActionSpec,
    registry: &ModelRegistry,
) -> Result<ActionDescriptor, RegistrationError> {
    // Instance actions name their receiver first
    if !spec.is_static && spec.signature.is_empty() {
        check_arity(&spec.name, model, 0, spec.parameter_types.len() + 1)?;
    }
    let skip = if spec.is_static { 0 } else { 1 };
    let names: Vec<&str> = spec.signature.iter().skip(skip).map(|s| s.as_str()).collect();

    check_arity(&spec.name, model, names.len(), spec.parameter_types.len())?;
    if spec.defaults.len() > names.len() {
        check_arity(&spec.name, model, names.len(), spec.defaults.len())?;
    }
    check_unique(&spec.name, model, &names)?;

    let default_offset = names.len() - spec.defaults.len();
    let parameter_list = names
        .iter()
        .zip(&spec.parameter_types)
        .enumerate()
        .map(|(index, (name, parameter_type))| {
            let default = index
                .checked_sub(default_offset)
                .map(|offset| spec.defaults[offset].clone());
            parameter_type.to_parameter(name, default, registry)
        })
        .collect();

    let return_parameter = spec
        .return_type
        .as_ref()
        .map(|return_type| return_type.to_parameter("return", None, registry));

    tracing::debug!(model = %model, action = %spec.name, "built action descriptor");

    Ok(ActionDescriptor {
        name: spec.name,
        doc: spec.doc,
        is_static: spec.is_static,
        parameter_list,
        return_parameter,
        func: spec.func,
    })
}

/// Build a named list filter for `model`; filters take no defaults
pub fn build_filter(
    model: &str,
    spec: FilterSpec,
    registry: &ModelRegistry,
) -> Result<(String, ListFilter), RegistrationError> {
    let names: Vec<&str> = spec.signature.iter().map(|s| s.as_str()).collect();

    check_arity(&spec.name, model, names.len(), spec.parameter_types.len())?;
    check_unique(&spec.name, model, &names)?;

    let parameter_map: IndexMap<String, _> = names
        .iter()
        .zip(&spec.parameter_types)
        .map(|(name, parameter_type)| {
            (
                name.to_string(),
                parameter_type.to_parameter(name, None, registry),
            )
        })
        .collect();

    Ok((
        spec.name,
        ListFilter {
            func: spec.func,
            parameter_map,
        },
    ))
}

fn check_arity(
    callable: &str,
    model: &str,
    names: usize,
    types: usize,
) -> Result<(), RegistrationError> {
    if names != types {
        return Err(RegistrationError::SignatureMismatch {
            callable: callable.to_string(),
            model: model.to_string(),
            names,
            types,
        });
    }
    Ok(())
}

fn check_unique(callable: &str, model: &str, names: &[&str]) -> Result<(), RegistrationError> {
    for (index, name) in names.iter().enumerate() {
        if names[..index].contains(name) {
            return Err(RegistrationError::invalid(format!(
                "parameter '{}' declared twice for \"{}\" of \"{}\"",
                name, callable, model
            )));
        }
    }
    Ok(())
}
