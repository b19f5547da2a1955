//! Value conversion between wire values and store-native values
//!
//! Conversion is driven by a field or parameter descriptor. Model values
//! travel as `<model-path>:<primary-key>:` tokens and are loaded inside the
//! caller's transaction; File values leave as retrieval URLs and arrive as
//! uploaded content.

use crate::core::descriptor::{
    ActionDescriptor, FieldDescriptor, ModelDescriptor, ParameterDescriptor,
};
use crate::core::error::{Result, ValidationError, ValueError};
use crate::core::field::{
    FieldType, FieldValue, FileUpload, FileValue, Reference, ValueMap, WireValue,
};
use crate::core::store::Instance;
use crate::core::validation::validators;
use crate::registry::ModelRegistry;
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rand::Rng;
use serde_json::{Map, Value};
use std::sync::Arc;

const FILENAME_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_-";
const FILENAME_LENGTH: usize = 20;

/// What a value is converted for
#[derive(Debug, Clone, Copy)]
pub enum ValueTarget<'a> {
    /// A field of `model`; persisted File fields are saved through the store
    Field {
        model: &'a ModelDescriptor,
        field: &'a FieldDescriptor,
    },
    /// An action or filter parameter
    Parameter(&'a ParameterDescriptor),
}

impl<'a> ValueTarget<'a> {
    pub fn parameter(&self) -> &'a ParameterDescriptor {
        match *self {
            ValueTarget::Field { field, .. } => &field.parameter,
            ValueTarget::Parameter(param) => param,
        }
    }
}

/// Converter bound to a closed model registry
#[derive(Debug, Clone)]
pub struct Converter {
    registry: Arc<ModelRegistry>,
}

impl Converter {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    // ===== Wire → store =====

    /// Convert one inbound value
    pub fn to_store_value(
        &self,
        target: ValueTarget<'_>,
        value: WireValue,
        transaction: &mut Transaction,
    ) -> Result<FieldValue> {
        let param = target.parameter();

        if param.is_array {
            let items = match value {
                WireValue::Json(Value::Null) => return Ok(FieldValue::Null),
                WireValue::Json(Value::Array(items)) => {
                    items.into_iter().map(WireValue::Json).collect()
                }
                WireValue::List(items) => items,
                _ => return Err(ValueError::invalid(&param.name, "Expected a list.").into()),
            };
            let converted = items
                .into_iter()
                .map(|item| self.to_store_element(target, item, transaction))
                .collect::<Result<Vec<_>>>()?;
            return Ok(FieldValue::List(converted));
        }

        self.to_store_element(target, value, transaction)
    }

    /// Convert a map of field values for CREATE/UPDATE
    ///
    /// Names the model does not know are reported as validation failures.
    pub fn to_store_map(
        &self,
        model: &ModelDescriptor,
        values: IndexMap<String, WireValue>,
        transaction: &mut Transaction,
    ) -> Result<ValueMap> {
        let mut errors = ValidationError::new();
        let mut converted = ValueMap::new();
        for (name, value) in values {
            let Some(field) = model.field(&name) else {
                errors.add(name, "Unknown field.");
                continue;
            };
            let value = self.to_store_value(ValueTarget::Field { model, field }, value, transaction)?;
            converted.insert(name, value);
        }
        errors.into_result()?;
        Ok(converted)
    }

    /// Convert the arguments of an action call
    pub fn to_store_args(
        &self,
        action: &ActionDescriptor,
        args: IndexMap<String, WireValue>,
        transaction: &mut Transaction,
    ) -> Result<ValueMap> {
        self.convert_parameters(args, transaction, |name| action.parameter(name))
    }

    /// Convert the values of a named list filter
    pub fn to_store_filter_values(
        &self,
        model: &ModelDescriptor,
        filter_name: &str,
        values: IndexMap<String, WireValue>,
        transaction: &mut Transaction,
    ) -> Result<ValueMap> {
        let filter = model.list_filter_map.get(filter_name).ok_or_else(|| {
            ValueError::invalid(filter_name, format!("No filter named '{}'.", filter_name))
        })?;
        self.convert_parameters(values, transaction, |name| filter.parameter_map.get(name))
    }

    fn convert_parameters<'p>(
        &self,
        values: IndexMap<String, WireValue>,
        transaction: &mut Transaction,
        lookup: impl Fn(&str) -> Option<&'p ParameterDescriptor>,
    ) -> Result<ValueMap> {
        let mut errors = ValidationError::new();
        let mut converted = ValueMap::new();
        for (name, value) in values {
            let Some(param) = lookup(&name) else {
                errors.add(name, "Unknown parameter.");
                continue;
            };
            let value = self.to_store_value(ValueTarget::Parameter(param), value, transaction)?;
            converted.insert(name, value);
        }
        errors.into_result()?;
        Ok(converted)
    }

    fn to_store_element(
        &self,
        target: ValueTarget<'_>,
        value: WireValue,
        transaction: &mut Transaction,
    ) -> Result<FieldValue> {
        let param = target.parameter();
        match value {
            WireValue::Json(Value::Null) => Ok(FieldValue::Null),
            WireValue::File(upload) if param.kind == FieldType::File => {
                self.store_file(target, upload, transaction)
            }
            WireValue::Json(json) => match param.kind {
                FieldType::Model => self.load_model(param, &json, transaction),
                FieldType::File => Err(ValueError::invalid(&param.name, "Expected file content.").into()),
                _ => Ok(decode_scalar(param, json)?),
            },
            WireValue::File(_) => {
                Err(ValueError::invalid(&param.name, "File content is only accepted for File values.").into())
            }
            WireValue::List(_) => Err(ValueError::invalid(&param.name, "Unexpected list.").into()),
        }
    }

    /// Resolve a `<path>:<pk>:` token and load the instance it names
    fn load_model(
        &self,
        param: &ParameterDescriptor,
        json: &Value,
        transaction: &mut Transaction,
    ) -> Result<FieldValue> {
        let token = json
            .as_str()
            .ok_or_else(|| ValueError::invalid(&param.name, "Expected a model token."))?;
        let (path, id) = parse_token(token)
            .ok_or_else(|| ValueError::invalid(&param.name, format!("Malformed model token '{}'.", token)))?;

        let target = self
            .registry
            .resolve_path(path)
            .ok_or_else(|| ValueError::invalid(&param.name, format!("Unknown model path '{}'.", path)))?;

        if let Some(expected) = &param.model {
            if expected.identifier() != target.identifier {
                return Err(ValueError::invalid(
                    &param.name,
                    format!("Expected a '{}', got '{}'.", expected.identifier(), target.identifier),
                )
                .into());
            }
        }

        let instance = transaction.get(target, id)?.ok_or_else(|| ValueError::NotFound {
            model: target.path.clone(),
            id: id.to_string(),
        })?;
        let key = instance.pk.unwrap_or(FieldValue::Null);
        Ok(FieldValue::Reference(Reference::new(&target.identifier, key)))
    }

    fn store_file(
        &self,
        target: ValueTarget<'_>,
        upload: FileUpload,
        transaction: &mut Transaction,
    ) -> Result<FieldValue> {
        let filename = upload.filename.unwrap_or_else(random_filename);

        let file = match target {
            ValueTarget::Field { model, field } if field.persisted => {
                transaction.save_file(&model.identifier, &field.name, &filename, &upload.content)?
            }
            _ => FileValue::Detached {
                name: filename,
                content: upload.content,
            },
        };
        Ok(FieldValue::File(file))
    }

    // ===== Store → wire =====

    /// Convert one outbound value
    pub fn to_wire_value(
        &self,
        param: &ParameterDescriptor,
        value: &FieldValue,
    ) -> std::result::Result<Value, ValueError> {
        match value {
            FieldValue::Null => Ok(Value::Null),
            FieldValue::List(items) if param.is_array => items
                .iter()
                .map(|item| self.to_wire_element(param, item))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Array),
            other => self.to_wire_element(param, other),
        }
    }

    /// Every field of `instance` as described by `model`
    ///
    /// Computed properties the host did not fill are rendered as null.
    pub fn to_wire_instance(
        &self,
        model: &ModelDescriptor,
        instance: &Instance,
    ) -> std::result::Result<Map<String, Value>, ValueError> {
        let mut result = Map::new();
        for (name, field) in &model.field_map {
            let value = match instance.get(name) {
                Some(value) => self.to_wire_value(&field.parameter, value)?,
                None => Value::Null,
            };
            result.insert(name.clone(), value);
        }
        Ok(result)
    }

    fn to_wire_element(
        &self,
        param: &ParameterDescriptor,
        value: &FieldValue,
    ) -> std::result::Result<Value, ValueError> {
        match (param.kind, value) {
            (_, FieldValue::Null) => Ok(Value::Null),
            (FieldType::Model, value) => {
                let path = param
                    .model
                    .as_ref()
                    .and_then(|model| model.path())
                    .ok_or_else(|| ValueError::invalid(&param.name, "Model reference is unresolved."))?;
                Ok(Value::String(model_token(path, &value.clone().into_key())))
            }
            (_, FieldValue::File(FileValue::Stored { url, .. })) => Ok(Value::String(url.clone())),
            (_, FieldValue::File(FileValue::Detached { name, .. })) => Ok(Value::String(name.clone())),
            (_, value) => Ok(encode_scalar(value)),
        }
    }
}

/// Render the wire token of a model instance; the trailing colon is always present
pub fn model_token(path: &str, key: &FieldValue) -> String {
    format!("{}:{}:", path, key)
}

/// Split `<path>:<pk>:` into its path and key
fn parse_token(token: &str) -> Option<(&str, &str)> {
    let (path, id) = token.strip_suffix(':')?.rsplit_once(':')?;
    if path.is_empty() {
        return None;
    }
    Some((path, id))
}

fn random_filename() -> String {
    let mut rng = rand::rng();
    (0..FILENAME_LENGTH)
        .map(|_| FILENAME_CHARSET[rng.random_range(0..FILENAME_CHARSET.len())] as char)
        .collect()
}

fn decode_scalar(param: &ParameterDescriptor, json: Value) -> std::result::Result<FieldValue, ValueError> {
    let name = param.name.as_str();
    let value = match (param.kind, json) {
        (FieldType::String, Value::String(s)) => FieldValue::String(s),
        (FieldType::Integer, Value::Number(n)) => n
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| ValueError::invalid(name, "Expected an integer."))?,
        (FieldType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| ValueError::invalid(name, format!("'{}' is not an integer.", s)))?,
        (FieldType::Float, Value::Number(n)) => n
            .as_f64()
            .map(FieldValue::Float)
            .ok_or_else(|| ValueError::invalid(name, "Expected a number."))?,
        (FieldType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|_| ValueError::invalid(name, format!("'{}' is not a number.", s)))?,
        (FieldType::Boolean, Value::Bool(b)) => FieldValue::Boolean(b),
        (FieldType::Boolean, Value::String(s)) => match s.to_lowercase().as_str() {
            "true" => FieldValue::Boolean(true),
            "false" => FieldValue::Boolean(false),
            _ => return Err(ValueError::invalid(name, format!("'{}' is not a boolean.", s))),
        },
        (FieldType::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| FieldValue::DateTime(dt.with_timezone(&Utc)))
            .map_err(|e| ValueError::invalid(name, format!("'{}' is not an RFC 3339 datetime: {}", s, e)))?,
        (FieldType::Map, Value::Object(map)) => FieldValue::Map(map),
        (kind, other) => {
            return Err(ValueError::invalid(
                name,
                format!("Expected a {} value, got {}.", kind, json_kind(&other)),
            ));
        }
    };

    if let Some(length) = param.length {
        validators::max_length(length)(name, &value).map_err(|message| ValueError::invalid(name, message))?;
    }
    if let Some(choices) = &param.choice_list {
        validators::in_choices(choices.clone())(name, &value)
            .map_err(|message| ValueError::invalid(name, message))?;
    }
    Ok(value)
}

fn encode_scalar(value: &FieldValue) -> Value {
    match value {
        FieldValue::String(s) => Value::String(s.clone()),
        FieldValue::Integer(i) => Value::from(*i),
        FieldValue::Float(f) => Value::from(*f),
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::Uuid(u) => Value::String(u.to_string()),
        FieldValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
        FieldValue::Map(map) => Value::Object(map.clone()),
        FieldValue::File(file) => Value::String(file.url().unwrap_or(file.name()).to_string()),
        FieldValue::Reference(reference) => encode_scalar(&reference.key),
        FieldValue::List(items) => Value::Array(items.iter().map(encode_scalar).collect()),
        FieldValue::Null => Value::Null,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_model;
    use crate::config::ModelOptions;
    use crate::core::error::AdapterError;
    use crate::core::host::{HostField, ModelDefinition};
    use crate::storage::InMemoryStore;
    use serde_json::json;

    const NAMESPACE: &str = "/api/inventory/";

    struct Fixture {
        converter: Converter,
        widget: ModelDescriptor,
        tag: ModelDescriptor,
        transaction: Transaction,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let handle: Arc<dyn crate::core::store::Store> = Arc::new(store.clone());

        let tag = ModelDefinition::new("inventory", "Tag", handle.clone())
            .field(HostField::auto_id())
            .field(HostField::char("label", 20));
        let widget = ModelDefinition::new("inventory", "Widget", handle)
            .field(HostField::auto_id())
            .field(HostField::char("name", 10))
            .field(
                HostField::char("size", 1)
                    .choices(vec!["S".into(), "M".into(), "L".into()])
                    .default_value("M"),
            )
            .field(HostField::new("manual", crate::core::host::HostFieldKind::FileField).blank())
            .field(HostField::many_to_many("tags", "inventory.Tag"));
        store.create_table(&tag).unwrap();
        store.create_table(&widget).unwrap();

        let mut registry = ModelRegistry::new();
        let options = ModelOptions::default();
        let widget_desc = build_model(&widget, &options, &registry, NAMESPACE).unwrap();
        registry.register(widget_desc).unwrap();
        let tag_desc = build_model(&tag, &options, &registry, NAMESPACE).unwrap();
        registry.register(tag_desc).unwrap();
        registry.finalize().unwrap();

        let registry = Arc::new(registry);
        let widget = registry.resolve("inventory.Widget").unwrap().clone();
        let tag = registry.resolve("inventory.Tag").unwrap().clone();
        let mut transaction = widget.transaction_class.new_transaction();
        transaction.start().unwrap();

        Fixture {
            converter: Converter::new(registry),
            widget,
            tag,
            transaction,
        }
    }

    fn field<'a>(model: &'a ModelDescriptor, name: &str) -> ValueTarget<'a> {
        ValueTarget::Field {
            model,
            field: model.field(name).unwrap(),
        }
    }

    #[test]
    fn test_model_token_round_trip() {
        let mut fx = fixture();
        let mut values = ValueMap::new();
        values.insert("label".to_string(), "red".into());
        let tag = fx.tag.clone();
        let (key, _) = fx.transaction.create(&tag, values).unwrap();
        assert_eq!(key, FieldValue::Integer(1));

        let widget = fx.widget.clone();
        let target = field(&widget, "tags");
        let converted = fx
            .converter
            .to_store_value(target, json!(["/api/inventory/Tag:1:"]).into(), &mut fx.transaction)
            .unwrap();
        let FieldValue::List(items) = &converted else {
            panic!("Expected a list, got {:?}", converted);
        };
        assert_eq!(
            items[0],
            FieldValue::Reference(Reference::new("inventory.Tag", FieldValue::Integer(1)))
        );

        let wire = fx
            .converter
            .to_wire_value(&widget.field("tags").unwrap().parameter, &converted)
            .unwrap();
        assert_eq!(wire, json!(["/api/inventory/Tag:1:"]));
    }

    #[test]
    fn test_missing_instance_is_not_found() {
        let mut fx = fixture();
        let widget = fx.widget.clone();

        for token in ["/api/inventory/Tag:999:", "/api/inventory/Tag:abc:"] {
            let err = fx
                .converter
                .to_store_value(field(&widget, "tags"), json!([token]).into(), &mut fx.transaction)
                .unwrap_err();
            match err {
                AdapterError::Value(ValueError::NotFound { model, .. }) => {
                    assert_eq!(model, "/api/inventory/Tag")
                }
                other => panic!("Expected NotFound, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_bad_tokens_are_invalid() {
        let mut fx = fixture();
        let widget = fx.widget.clone();

        for token in ["no-colons", "/api/inventory/Nope:1:", "/api/inventory/Widget:1:", ":1:"] {
            let err = fx
                .converter
                .to_store_value(field(&widget, "tags"), json!([token]).into(), &mut fx.transaction)
                .unwrap_err();
            assert_eq!(err.error_code(), "INVALID_VALUE", "{}", token);
        }
    }

    #[test]
    fn test_parse_token() {
        assert_eq!(parse_token("/api/inv/Tag:12:"), Some(("/api/inv/Tag", "12")));
        assert_eq!(parse_token("/api/inv/Tag:12"), None);
        assert_eq!(parse_token("/api/inv/Tag::"), Some(("/api/inv/Tag", "")));
    }

    #[test]
    fn test_string_constraints() {
        let mut fx = fixture();
        let widget = fx.widget.clone();

        let ok = fx
            .converter
            .to_store_value(field(&widget, "name"), json!("bolt").into(), &mut fx.transaction)
            .unwrap();
        assert_eq!(ok, FieldValue::from("bolt"));

        let too_long = fx
            .converter
            .to_store_value(field(&widget, "name"), json!("much too long").into(), &mut fx.transaction)
            .unwrap_err();
        assert!(too_long.to_string().contains("at most 10"));

        let bad_choice = fx
            .converter
            .to_store_value(field(&widget, "size"), json!("X").into(), &mut fx.transaction)
            .unwrap_err();
        assert!(bad_choice.to_string().contains("not a valid choice"));
    }

    #[test]
    fn test_scalar_codec() {
        let mut param = ParameterDescriptor::new("count", FieldType::Integer);
        assert_eq!(decode_scalar(&param, json!(5)).unwrap(), FieldValue::Integer(5));
        assert_eq!(decode_scalar(&param, json!(" 7 ")).unwrap(), FieldValue::Integer(7));
        assert!(decode_scalar(&param, json!(1.5)).is_err());

        param.kind = FieldType::Boolean;
        assert_eq!(decode_scalar(&param, json!("TRUE")).unwrap(), FieldValue::Boolean(true));
        assert!(decode_scalar(&param, json!("yes")).is_err());

        param.kind = FieldType::DateTime;
        let value = decode_scalar(&param, json!("2024-05-01T12:00:00+02:00")).unwrap();
        assert_eq!(encode_scalar(&value), json!("2024-05-01T10:00:00+00:00"));

        param.kind = FieldType::Map;
        assert!(decode_scalar(&param, json!({"a": 1})).is_ok());
        assert!(decode_scalar(&param, json!([1])).is_err());
    }

    #[test]
    fn test_null_maps_to_null() {
        let mut fx = fixture();
        let widget = fx.widget.clone();
        let value = fx
            .converter
            .to_store_value(field(&widget, "tags"), json!(null).into(), &mut fx.transaction)
            .unwrap();
        assert!(value.is_null());
        let wire = fx
            .converter
            .to_wire_value(&widget.field("name").unwrap().parameter, &FieldValue::Null)
            .unwrap();
        assert_eq!(wire, Value::Null);
    }

    #[test]
    fn test_arrays_require_lists() {
        let mut fx = fixture();
        let widget = fx.widget.clone();
        let err = fx
            .converter
            .to_store_value(field(&widget, "tags"), json!("/api/inventory/Tag:1:").into(), &mut fx.transaction)
            .unwrap_err();
        assert!(err.to_string().contains("Expected a list"));
    }

    #[test]
    fn test_persisted_file_field_saves_through_store() {
        let mut fx = fixture();
        let widget = fx.widget.clone();
        let upload = FileUpload::new(b"%PDF".to_vec(), None);
        let value = fx
            .converter
            .to_store_value(field(&widget, "manual"), upload.into(), &mut fx.transaction)
            .unwrap();
        let FieldValue::File(FileValue::Stored { name, url }) = &value else {
            panic!("Expected a stored file, got {:?}", value);
        };
        assert_eq!(name.len(), FILENAME_LENGTH);
        assert!(name.bytes().all(|b| FILENAME_CHARSET.contains(&b)));
        assert_eq!(url, &format!("/files/{}", name));

        let wire = fx
            .converter
            .to_wire_value(&widget.field("manual").unwrap().parameter, &value)
            .unwrap();
        assert_eq!(wire, json!(url));
    }

    #[test]
    fn test_file_parameter_is_not_stored() {
        let mut fx = fixture();
        let param = ParameterDescriptor::new("attachment", FieldType::File);
        let upload = FileUpload::new(b"data".to_vec(), Some("notes.txt"));
        let value = fx
            .converter
            .to_store_value(ValueTarget::Parameter(&param), upload.into(), &mut fx.transaction)
            .unwrap();
        assert_eq!(
            value,
            FieldValue::File(FileValue::Detached {
                name: "notes.txt".to_string(),
                content: b"data".to_vec(),
            })
        );
    }

    #[test]
    fn test_unknown_fields_rejected_in_maps() {
        let mut fx = fixture();
        let widget = fx.widget.clone();
        let mut values = IndexMap::new();
        values.insert("name".to_string(), WireValue::from(json!("bolt")));
        values.insert("colour".to_string(), WireValue::from(json!("red")));
        let err = fx
            .converter
            .to_store_map(&widget, values, &mut fx.transaction)
            .unwrap_err();
        match err {
            AdapterError::Validation(errors) => {
                assert!(errors.fields().contains_key("colour"));
                assert!(!errors.fields().contains_key("name"));
            }
            other => panic!("Expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_wire_instance() {
        let mut fx = fixture();
        let widget = fx.widget.clone();
        let mut values = ValueMap::new();
        values.insert("name".to_string(), "bolt".into());
        let (key, created) = fx.transaction.create(&widget, values).unwrap();
        assert!(created.get("tags").is_none());

        let instance = fx.transaction.get(&widget, "1").unwrap().unwrap();
        let wire = fx.converter.to_wire_instance(&widget, &instance).unwrap();
        assert_eq!(wire["name"], json!("bolt"));
        assert_eq!(wire["size"], json!("M"));
        assert_eq!(wire["tags"], json!([]));
        assert_eq!(wire["manual"], Value::Null);
        assert_eq!(model_token(&widget.path, &key), "/api/inventory/Widget:1:");
    }
}
