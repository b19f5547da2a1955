//! Model descriptor construction from host definitions

use crate::config::{ModelOptions, PropertySpec};
use crate::core::auth::Verb;
use crate::core::descriptor::{FieldDescriptor, ModelDescriptor, ParameterDescriptor};
use crate::core::error::RegistrationError;
use crate::core::field::{FieldType, FieldValue, Mode};
use crate::core::host::{HostField, LinkModel, ModelDefinition};
use crate::registry::ModelRegistry;
use crate::transaction::TransactionClass;
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Build the descriptor of a host model
///
/// Fields are taken in their natural order. Host-generated fields are
/// skipped, then the hide/show filter applies. Computed properties from
/// `options.property_list` are appended last.
pub fn build_model(
    definition: &ModelDefinition,
    options: &ModelOptions,
    registry: &ModelRegistry,
    namespace_path: &str,
) -> Result<ModelDescriptor, RegistrationError> {
    let identifier = definition.identifier();

    if !options.hide_fields.is_empty() && !options.show_fields.is_empty() {
        return Err(RegistrationError::invalid(format!(
            "hide_fields and show_fields are mutually exclusive, model: '{}'",
            identifier
        )));
    }

    let mut field_map = IndexMap::new();

    for host in &definition.fields {
        if host.auto_created {
            continue;
        }
        if options.hide_fields.contains(&host.name) {
            continue;
        }
        if !options.show_fields.is_empty() && !options.show_fields.contains(&host.name) {
            continue;
        }

        let mut field = host_field(&identifier, host, registry)?;
        if options.read_only_fields.contains(&host.name) {
            field.mode = Mode::ReadOnly;
        }
        field_map.insert(host.name.clone(), field);
    }

    for property in &options.property_list {
        let field = property_field(&identifier, property, registry)?;
        if field_map.contains_key(&field.name) {
            return Err(RegistrationError::invalid(format!(
                "property '{}' shadows a field of model '{}'",
                field.name, identifier
            )));
        }
        field_map.insert(field.name.clone(), field);
    }

    tracing::debug!(
        model = %identifier,
        fields = field_map.len(),
        "built model descriptor"
    );

    Ok(ModelDescriptor {
        identifier,
        name: definition.name.clone(),
        path: format!("{}{}", namespace_path, definition.name),
        doc: definition.doc.clone(),
        field_map,
        constant_set_map: options.constant_set_map.clone(),
        not_allowed_verb_list: options.not_allowed_verbs.iter().copied().collect(),
        list_filter_map: IndexMap::new(),
        transaction_class: TransactionClass::new(definition.store.clone()),
        action_list: Vec::new(),
        cache_length: options.cache_length,
    })
}

/// Build a field-less model that only hosts static actions
///
/// LIST, GET, CREATE, UPDATE and DELETE are always disallowed on top of
/// `options.not_allowed_verbs`. Host fields and properties are ignored.
pub fn build_static_model(
    definition: &ModelDefinition,
    options: &ModelOptions,
    namespace_path: &str,
) -> ModelDescriptor {
    let mut not_allowed: BTreeSet<Verb> = Verb::CRUD.into_iter().collect();
    not_allowed.extend(options.not_allowed_verbs.iter().copied());

    ModelDescriptor {
        identifier: definition.identifier(),
        name: definition.name.clone(),
        path: format!("{}{}", namespace_path, definition.name),
        doc: definition.doc.clone(),
        field_map: IndexMap::new(),
        constant_set_map: IndexMap::new(),
        not_allowed_verb_list: not_allowed,
        list_filter_map: IndexMap::new(),
        transaction_class: TransactionClass::new(definition.store.clone()),
        action_list: Vec::new(),
        cache_length: options.cache_length,
    }
}

fn host_field(
    model: &str,
    host: &HostField,
    registry: &ModelRegistry,
) -> Result<FieldDescriptor, RegistrationError> {
    let kind = host
        .type_override
        .or_else(|| host.kind.field_type())
        .ok_or_else(|| RegistrationError::UnsupportedFieldType {
            kind: host.kind.to_string(),
            field: host.name.clone(),
            model: model.to_string(),
        })?;

    let mut mode = match (host.editable, host.primary_key) {
        (true, true) => Mode::ReadCreateOnly,
        (true, false) => Mode::ReadWrite,
        (false, _) => Mode::ReadOnly,
    };

    let mut parameter = ParameterDescriptor {
        name: host.name.clone(),
        doc: host.help_text.clone(),
        kind,
        required: host.is_required(),
        default: host.default.clone(),
        length: if kind == FieldType::String {
            host.max_length
        } else {
            None
        },
        choice_list: host.choices.clone(),
        is_array: host.is_array.unwrap_or(false),
        model: None,
        allowed_scheme_list: None,
    };

    if kind == FieldType::Model {
        let relation = host.relation.as_ref().ok_or_else(|| {
            RegistrationError::invalid(format!(
                "field '{}' of model '{}' is Model typed but has no relation",
                host.name, model
            ))
        })?;

        let target = match &relation.link {
            // A generated link table carries nothing but the two keys
            Some(LinkModel::AutoCreated) => {
                mode = Mode::ReadWrite;
                parameter.is_array = true;
                relation.target.as_str()
            }
            // Extra attributes of a user-defined link stay reachable through it
            Some(LinkModel::Explicit(link)) => {
                mode = Mode::ReadOnly;
                parameter.is_array = true;
                link.as_str()
            }
            None => relation.target.as_str(),
        };
        parameter.model = Some(registry.reference(target));
    }

    Ok(FieldDescriptor {
        parameter,
        mode,
        persisted: true,
    })
}

fn property_field(
    model: &str,
    property: &PropertySpec,
    registry: &ModelRegistry,
) -> Result<FieldDescriptor, RegistrationError> {
    let parameter = match property {
        PropertySpec::Name(name) => ParameterDescriptor::new(name.clone(), FieldType::String),
        PropertySpec::Detailed(detail) => {
            let mut parameter = ParameterDescriptor::new(detail.name.clone(), detail.kind);
            parameter.doc = detail.doc.clone();
            parameter.is_array = detail.is_array;
            parameter.choice_list = detail
                .choices
                .as_ref()
                .map(|choices| choices.iter().map(|c| FieldValue::from(c.as_str())).collect());
            parameter.model = detail
                .model
                .as_deref()
                .map(|identifier| registry.reference(identifier));
            if detail.kind == FieldType::Model && parameter.model.is_none() {
                return Err(RegistrationError::invalid(format!(
                    "property '{}' of model '{}' is Model typed but names no model",
                    detail.name, model
                )));
            }
            parameter
        }
    };

    Ok(FieldDescriptor {
        parameter: ParameterDescriptor {
            required: false,
            default: None,
            ..parameter
        },
        mode: Mode::ReadOnly,
        persisted: false,
    })
}
