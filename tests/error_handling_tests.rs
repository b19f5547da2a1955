//! Integration tests for error codes and error responses produced by real
//! operations

mod model_harness;

use model_harness::*;
use this_adapter::core::ListFilter;
use this_adapter::prelude::*;

#[test]
fn test_validation_failure_response_carries_fields() {
    let inventory = inventory();
    let widget = inventory.widget();
    let mut tx = inventory.begin();

    let err = inventory
        .converter()
        .to_store_map(&widget, wire(&[("colour", json!("red"))]), &mut tx)
        .unwrap_err();
    assert!(!err.is_fatal());

    let response = err.to_response();
    assert_eq!(response.code, "VALIDATION_FAILURE");
    let details = response.details.unwrap();
    assert_eq!(details["fields"]["colour"], json!(["Unknown field."]));
}

#[test]
fn test_choice_violation_is_invalid_value() {
    let inventory = inventory();
    let widget = inventory.widget();
    let mut tx = inventory.begin();

    let err = inventory
        .converter()
        .to_store_map(&widget, wire(&[("size", json!("XL"))]), &mut tx)
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_VALUE");
    assert!(err.to_string().contains("size"));
}

#[test]
fn test_over_long_value_is_invalid_value() {
    let inventory = inventory();
    let widget = inventory.widget();
    let mut tx = inventory.begin();

    let err = inventory
        .converter()
        .to_store_map(&widget, wire(&[("name", json!("x".repeat(51)))]), &mut tx)
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_VALUE");
}

#[test]
fn test_wrong_model_token_is_invalid_value() {
    let inventory = inventory();
    let widget = inventory.widget();
    let mut tx = inventory.begin();
    seed_tags(&inventory, &mut tx, 1);

    // A Tag token where a Bin is expected
    let err = inventory
        .converter()
        .to_store_map(&widget, wire(&[("home", json!(tag_token(1)))]), &mut tx)
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_VALUE");

    for token in ["Tag:1", ":1:", "no colons", "/api/inventory/Nope:1:"] {
        let err = inventory
            .converter()
            .to_store_map(&widget, wire(&[("tags", json!([token]))]), &mut tx)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_VALUE", "token {:?}", token);
    }
}

#[test]
fn test_not_found_response_names_model_and_id() {
    let inventory = inventory();
    let widget = inventory.widget();
    let mut tx = inventory.begin();

    let err = inventory
        .converter()
        .to_store_map(
            &widget,
            wire(&[("tags", json!([format!("{}:abc:", TAG_PATH)]))]),
            &mut tx,
        )
        .unwrap_err();

    let response = err.to_response();
    assert_eq!(response.code, "NOT_FOUND");
    let details = response.details.unwrap();
    assert_eq!(details["model"], TAG_PATH);
    assert_eq!(details["id"], "abc");
}

#[test]
fn test_action_failure_is_wrapped_with_its_name() {
    let inventory = inventory();
    let widget = inventory.widget();
    let mut tx = inventory.begin();

    let failing = ActionDescriptor {
        name: "explode".to_string(),
        doc: None,
        is_static: true,
        parameter_list: Vec::new(),
        return_parameter: None,
        func: Arc::new(
            |_ctx: ActionContext<'_>| -> anyhow::Result<Option<FieldValue>> {
                Err(anyhow::anyhow!("boom"))
            },
        ),
    };
    let mut descriptor = (*widget).clone();
    descriptor.action_list.push(failing);

    let err = tx.call(&descriptor, "explode", None, ValueMap::new()).unwrap_err();
    assert_eq!(err.error_code(), "ACTION_FAILED");
    assert!(err.to_string().contains("explode"));
    assert!(err.to_string().contains("boom"));
    assert!(!err.is_fatal());
}

#[test]
fn test_filter_failure_is_wrapped_with_its_name() {
    let inventory = inventory();
    let widget = inventory.widget();
    let mut tx = inventory.begin();

    let failing = ListFilter {
        func: Arc::new(
            |_session: &mut dyn Session, _values: &ValueMap| -> anyhow::Result<QuerySet> {
                Err(anyhow::anyhow!("index missing"))
            },
        ),
        parameter_map: Default::default(),
    };
    let mut descriptor = (*widget).clone();
    descriptor
        .list_filter_map
        .insert("broken".to_string(), failing);

    let err = tx
        .list(&descriptor, Some("broken"), &ValueMap::new(), 0, 10)
        .unwrap_err();
    assert_eq!(err.error_code(), "FILTER_FAILED");
    assert_eq!(err.to_string(), "filter 'broken' failed: index missing");
    assert!(!err.is_fatal());
}

#[test]
fn test_unknown_action_is_internal() {
    let inventory = inventory();
    let widget = inventory.widget();
    let mut tx = inventory.begin();

    let err = tx.call(&widget, "vanish", None, ValueMap::new()).unwrap_err();
    assert_eq!(err.error_code(), "INTERNAL_ERROR");
    assert!(err.is_fatal());
}

#[test]
fn test_store_failure_on_duplicate_key() {
    let store = InMemoryStore::new();
    let handle: Arc<dyn Store> = Arc::new(store.clone());
    let code = ModelDefinition::new("inventory", "Code", handle)
        .field(HostField::char("sku", 8).primary_key());
    store.create_table(&code).unwrap();

    let mut registry = ModelRegistry::new();
    let mut adapter = Adapter::new("inventory", "1.0", "").unwrap();
    adapter.model(&mut registry, &code).unwrap();
    let registrations = finalize(registry, vec![adapter]).unwrap();
    let model = registrations.model_by_path("/api/inventory/Code").unwrap();

    let mut tx = model.new_transaction();
    tx.start().unwrap();
    let mut values = ValueMap::new();
    values.insert("sku".to_string(), FieldValue::from("A-1"));
    let (key, _) = tx.create(&model.descriptor, values.clone()).unwrap();
    assert_eq!(key, FieldValue::from("A-1"));

    let err = tx.create(&model.descriptor, values).unwrap_err();
    assert_eq!(err.error_code(), "STORE_FAILURE");
    assert!(err.to_string().contains("UNIQUE"));
}

#[test]
fn test_missing_explicit_key_fails_validation() {
    let store = InMemoryStore::new();
    let handle: Arc<dyn Store> = Arc::new(store.clone());
    let code = ModelDefinition::new("inventory", "Code", handle)
        .field(HostField::char("sku", 8).primary_key())
        .field(HostField::char("label", 20).blank());
    store.create_table(&code).unwrap();

    let mut registry = ModelRegistry::new();
    let mut adapter = Adapter::new("inventory", "1.0", "").unwrap();
    adapter.model(&mut registry, &code).unwrap();
    let registrations = finalize(registry, vec![adapter]).unwrap();
    let model = registrations.model_by_path("/api/inventory/Code").unwrap();

    let mut tx = model.new_transaction();
    tx.start().unwrap();
    let mut values = ValueMap::new();
    values.insert("label".to_string(), FieldValue::from("spare"));
    match tx.create(&model.descriptor, values).unwrap_err() {
        AdapterError::Validation(errors) => assert!(errors.fields().contains_key("sku")),
        other => panic!("Expected Validation, got {:?}", other),
    }
    tx.commit().unwrap();
    assert_eq!(store.row_count("inventory.Code").unwrap(), 0);
}

#[test]
fn test_transaction_state_errors() {
    let inventory = inventory();
    let mut tx = inventory.begin();

    let err = tx.start().unwrap_err();
    assert_eq!(err.error_code(), "TRANSACTION_STATE");
    assert!(err.to_response().details.is_none());

    tx.abort().unwrap();
    assert_eq!(tx.state(), TransactionState::Aborted);
    assert_eq!(tx.commit().unwrap_err().error_code(), "TRANSACTION_STATE");
}

#[test]
fn test_registration_error_is_fatal() {
    let err: AdapterError = Adapter::new("bad name", "1.0", "").unwrap_err().into();
    assert!(err.is_fatal());
    assert_eq!(err.to_response().code, "INVALID_CONFIGURATION");
}
