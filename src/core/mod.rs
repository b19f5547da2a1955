//! Core module containing the fundamental types of the adapter

pub mod auth;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod host;
pub mod query;
pub mod store;
pub mod validation;

pub use auth::{AuthContext, AuthPolicy, AuthTarget, CheckAuth, Verb};
pub use descriptor::{
    ActionContext, ActionDescriptor, ActionFn, FieldDescriptor, FilterFn, ListFilter,
    ModelDescriptor, ModelRef, ParameterDescriptor,
};
pub use error::{AdapterError, RegistrationError, Result, ValidationError, ValueError};
pub use field::{FieldType, FieldValue, FileUpload, FileValue, Mode, Reference, ValueMap, WireValue};
pub use host::{HostField, HostFieldKind, LinkModel, ModelDefinition, Relation};
pub use query::ListPage;
pub use store::{Instance, QuerySet, Session, Store, StoreEngine};
