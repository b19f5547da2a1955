//! # this-adapter
//!
//! A metadata-driven adapter exposing a host application's typed model layer
//! through a protocol-neutral interface: CRUD verbs, paginated listing, named
//! filters and custom actions.
//!
//! ## Features
//!
//! - **Descriptors**: host model definitions are introspected into field,
//!   parameter, action and model descriptors a server can navigate
//! - **Deferred References**: models may reference each other in any order,
//!   circular references included; the registry settles them on finalize
//! - **Value Conversion**: model tokens (`<path>:<pk>:`), file uploads and
//!   scalars are converted both ways according to descriptors
//! - **Transactions**: get/create/update/list/delete/call with explicit
//!   start/commit/abort, over any [`core::store::Store`]
//! - **Authorization Hooks**: per-model predicates, actions receive their name
//! - **Configuration-Based**: per-model options can be loaded from YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use this_adapter::prelude::*;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let widget = ModelDefinition::new("inventory", "Widget", store.clone())
//!     .field(HostField::auto_id())
//!     .field(HostField::char("name", 50))
//!     .field(HostField::many_to_many("tags", "inventory.Tag"));
//! let tag = ModelDefinition::new("inventory", "Tag", store.clone())
//!     .field(HostField::auto_id())
//!     .field(HostField::char("label", 20));
//!
//! let mut registry = ModelRegistry::new();
//! let mut inventory = Adapter::new("inventory", "1.0", "Stock keeping")?;
//! inventory.model(&mut registry, &widget)?;
//! inventory.model(&mut registry, &tag)?;
//!
//! let registrations = finalize(registry, vec![inventory])?;
//! let widgets = registrations.model_by_path("/api/inventory/Widget").unwrap();
//!
//! let mut tx = widgets.new_transaction();
//! tx.start()?;
//! let page = tx.list(&widgets.descriptor, None, &ValueMap::new(), 0, 50)?;
//! tx.commit()?;
//! ```

pub mod adapter;
pub mod builder;
pub mod config;
pub mod convert;
pub mod core;
pub mod registry;
pub mod storage;
pub mod transaction;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Types ===
    pub use crate::core::{
        auth::{
            AuthContext, AuthPolicy, AuthTarget, CheckAuth, Verb, basic_auth_check, policy_check,
        },
        descriptor::{
            ActionContext, ActionDescriptor, FieldDescriptor, ModelDescriptor, ModelRef,
            ParameterDescriptor,
        },
        error::{AdapterError, RegistrationError, ValidationError, ValueError},
        field::{FieldType, FieldValue, FileUpload, FileValue, Mode, ValueMap, WireValue},
        host::{HostField, HostFieldKind, LinkModel, ModelDefinition, Relation},
        query::ListPage,
        store::{Instance, QuerySet, Session, Store, StoreEngine},
    };

    // === Registration ===
    pub use crate::adapter::{
        ActionRegistration, Adapter, ModelRegistration, Namespace, Registrations, finalize,
    };
    pub use crate::builder::{ActionSpec, FilterSpec, ParameterType};
    pub use crate::registry::ModelRegistry;

    // === Runtime ===
    pub use crate::convert::{Converter, ValueTarget};
    pub use crate::transaction::{Transaction, TransactionClass, TransactionState};

    // === Storage ===
    pub use crate::storage::InMemoryStore;

    // === Config ===
    pub use crate::config::{AdapterConfig, ModelOptions, PropertySpec};

    // === External dependencies ===
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
