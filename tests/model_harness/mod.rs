//! Shared model fixtures for integration tests
//!
//! Builds an `inventory` namespace over one in-memory store:
//!
//! - `Widget`: name, count (default 0), size (S/M/L, default M), a
//!   read-only `created` stamp, a `manual` file, `tags` (auto-linked
//!   many-to-many), `bins` (many-to-many through `Placement`) and an
//!   optional `home` bin
//! - `Tag`, `Bin`: a single label each
//! - `Placement`: the explicit link between widgets and bins
//!
//! `Widget` is registered first so every cross-model reference starts out
//! pending. It carries a `restock` instance action, a static `census`
//! action and a `by_name` list filter.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod model_harness;
//! use model_harness::*;
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use this_adapter::prelude::*;

pub const WIDGET: &str = "inventory.Widget";
pub const WIDGET_PATH: &str = "/api/inventory/Widget";
pub const TAG_PATH: &str = "/api/inventory/Tag";
pub const BIN_PATH: &str = "/api/inventory/Bin";

pub struct Inventory {
    pub store: InMemoryStore,
    pub registrations: Registrations,
}

impl Inventory {
    pub fn namespace(&self) -> &Namespace {
        self.registrations
            .namespace("inventory")
            .expect("inventory namespace")
    }

    pub fn model(&self, name: &str) -> &ModelRegistration {
        self.namespace().model(name).expect("registered model")
    }

    pub fn widget(&self) -> Arc<ModelDescriptor> {
        self.model("Widget").descriptor.clone()
    }

    pub fn tag(&self) -> Arc<ModelDescriptor> {
        self.model("Tag").descriptor.clone()
    }

    pub fn converter(&self) -> &Converter {
        self.namespace().converter()
    }

    /// A started transaction on the shared store
    pub fn begin(&self) -> Transaction {
        let mut tx = self.model("Widget").new_transaction();
        tx.start().expect("start transaction");
        tx
    }
}

pub fn widget_definition(store: Arc<dyn Store>) -> ModelDefinition {
    ModelDefinition::new("inventory", "Widget", store)
        .doc("Something kept in stock")
        .field(HostField::auto_id())
        .field(HostField::char("name", 50).help_text("Display name"))
        .field(HostField::integer("count").default_value(0i64))
        .field(
            HostField::char("size", 1)
                .choices(vec!["S".into(), "M".into(), "L".into()])
                .default_value("M"),
        )
        .field(
            HostField::new("created", HostFieldKind::DateTimeField)
                .not_editable()
                .blank()
                .null(),
        )
        .field(HostField::new("manual", HostFieldKind::FileField).blank())
        .field(HostField::many_to_many("tags", "inventory.Tag"))
        .field(HostField::many_to_many_through(
            "bins",
            "inventory.Bin",
            "inventory.Placement",
        ))
        .field(HostField::foreign_key("home", "inventory.Bin").blank().null())
}

pub fn tag_definition(store: Arc<dyn Store>) -> ModelDefinition {
    ModelDefinition::new("inventory", "Tag", store)
        .field(HostField::auto_id())
        .field(HostField::char("label", 20))
}

pub fn bin_definition(store: Arc<dyn Store>) -> ModelDefinition {
    ModelDefinition::new("inventory", "Bin", store)
        .field(HostField::auto_id())
        .field(HostField::char("label", 20))
}

pub fn placement_definition(store: Arc<dyn Store>) -> ModelDefinition {
    ModelDefinition::new("inventory", "Placement", store)
        .field(HostField::auto_id())
        .field(HostField::foreign_key("widget", "inventory.Widget"))
        .field(HostField::foreign_key("bin", "inventory.Bin"))
        .field(HostField::integer("quantity").default_value(1i64))
}

pub fn restock_action() -> ActionSpec {
    ActionSpec::new("restock", |ctx: ActionContext<'_>| {
        let amount = ctx
            .args
            .get("amount")
            .and_then(FieldValue::as_integer)
            .unwrap_or(0);
        let target = ctx
            .target
            .ok_or_else(|| anyhow::anyhow!("restock needs a widget"))?;
        let count = target.get("count").and_then(FieldValue::as_integer).unwrap_or(0) + amount;
        target.set("count", FieldValue::Integer(count));
        ctx.session.save(target)?;
        Ok(Some(FieldValue::Integer(count)))
    })
    .doc("Add stock to a widget")
    .signature(&["self", "amount", "note"])
    .parameter(FieldType::Integer)
    .parameter(ParameterType::new(FieldType::String).length(20))
    .defaults(vec![FieldValue::from("restock")])
    .returns(FieldType::Integer)
}

pub fn census_action() -> ActionSpec {
    ActionSpec::new("census", |ctx: ActionContext<'_>| {
        let all = ctx.session.all(WIDGET)?;
        Ok(Some(FieldValue::Integer(all.len() as i64)))
    })
    .static_action()
    .returns(FieldType::Integer)
}

pub fn by_name_filter() -> FilterSpec {
    FilterSpec::new("by_name", |session: &mut dyn Session, values: &ValueMap| {
        let name = values.get("name").cloned().unwrap_or(FieldValue::Null);
        let matches = session.filter(WIDGET, &|instance: &Instance| {
            instance.get("name") == Some(&name)
        })?;
        Ok(matches)
    })
    .signature(&["name"])
    .parameter(FieldType::String)
}

/// Register and finalize the inventory namespace
pub fn inventory() -> Inventory {
    inventory_on(InMemoryStore::new())
}

pub fn inventory_on(store: InMemoryStore) -> Inventory {
    init_tracing();
    let handle: Arc<dyn Store> = Arc::new(store.clone());
    let widget = widget_definition(handle.clone());
    let tag = tag_definition(handle.clone());
    let bin = bin_definition(handle.clone());
    let placement = placement_definition(handle);

    for definition in [&widget, &tag, &bin, &placement] {
        store.create_table(definition).expect("create table");
    }

    let mut registry = ModelRegistry::new();
    let mut adapter = Adapter::new("inventory", "1.0", "Stock keeping").expect("adapter");
    adapter.model(&mut registry, &widget).expect("widget");
    adapter.model(&mut registry, &tag).expect("tag");
    adapter.model(&mut registry, &bin).expect("bin");
    adapter.model(&mut registry, &placement).expect("placement");

    adapter
        .action(&mut registry, WIDGET, restock_action())
        .expect("restock");
    adapter
        .action(&mut registry, WIDGET, census_action())
        .expect("census");
    adapter
        .list_filter(&mut registry, WIDGET, by_name_filter())
        .expect("by_name");
    adapter
        .check_auth(WIDGET, basic_auth_check("inventory", "Widget"))
        .expect("check_auth");

    let registrations = finalize(registry, vec![adapter]).expect("finalize");
    Inventory {
        store,
        registrations,
    }
}

/// Route adapter logs to the test writer; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wire values keyed by name
pub fn wire(pairs: &[(&str, Value)]) -> indexmap::IndexMap<String, WireValue> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), WireValue::from(value.clone())))
        .collect()
}

/// Model token of a Tag
pub fn tag_token(id: i64) -> String {
    format!("{}:{}:", TAG_PATH, id)
}

/// Create `count` tags and return their keys
pub fn seed_tags(inventory: &Inventory, tx: &mut Transaction, count: usize) -> Vec<FieldValue> {
    let tag = inventory.tag();
    (0..count)
        .map(|i| {
            let mut values = ValueMap::new();
            values.insert("label".to_string(), FieldValue::from(format!("tag-{}", i)));
            tx.create(&tag, values).expect("create tag").0
        })
        .collect()
}
