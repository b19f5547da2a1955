//! Typed error handling for the adapter
//!
//! Errors fall in two families:
//!
//! - Registration-time errors ([`RegistrationError`]) describe a static
//!   configuration defect. They abort construction and are never retried.
//! - Request-time errors ([`ValueError`], [`ValidationError`], [`StorageError`],
//!   [`TransactionError`], action failures) are surfaced to the caller, which
//!   decides whether to retry.
//!
//! A missing object on `get`/`update`/`delete` is *not* an error: those
//! operations return an absent result instead.
//!
//! # Example
//!
//! ```rust,ignore
//! match transaction.create(&model, values) {
//!     Ok((id, _)) => println!("created {}", id),
//!     Err(AdapterError::Validation(errors)) => {
//!         for (field, messages) in errors.fields() {
//!             println!("{}: {:?}", field, messages);
//!         }
//!     }
//!     Err(e) => eprintln!("{} ({})", e, e.error_code()),
//! }
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = AdapterError> = std::result::Result<T, E>;

/// The main error type for the adapter
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Static configuration defects detected while registering models
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Wire value could not be converted
    #[error(transparent)]
    Value(#[from] ValueError),

    /// Field-keyed validation failures from create/update
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Lower-level store failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Transaction lifecycle misuse
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Failure raised by a host action callable
    #[error("action '{name}' failed: {source}")]
    Action {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Failure raised by a host list filter
    #[error("filter '{name}' failed: {source}")]
    Filter {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal consistency errors (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure handed to the protocol layer
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AdapterError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AdapterError::Registration(e) => e.error_code(),
            AdapterError::Value(e) => e.error_code(),
            AdapterError::Validation(_) => "VALIDATION_FAILURE",
            AdapterError::Storage(_) => "STORE_FAILURE",
            AdapterError::Transaction(_) => "TRANSACTION_STATE",
            AdapterError::Action { .. } => "ACTION_FAILED",
            AdapterError::Filter { .. } => "FILTER_FAILED",
            AdapterError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error indicates a configuration defect that must abort startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdapterError::Registration(_) | AdapterError::Internal(_)
        )
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AdapterError::Validation(errors) => Some(serde_json::json!({
                "fields": errors.fields()
            })),
            AdapterError::Value(ValueError::NotFound { model, id }) => Some(serde_json::json!({
                "model": model,
                "id": id
            })),
            AdapterError::Registration(RegistrationError::UnresolvedReference {
                model,
                field,
                target,
            }) => Some(serde_json::json!({
                "model": model,
                "field": field,
                "target": target
            })),
            _ => None,
        }
    }

    /// Wrap a host callable failure
    pub fn action(name: impl Into<String>, source: anyhow::Error) -> Self {
        AdapterError::Action {
            name: name.into(),
            source,
        }
    }

    /// Wrap a list filter failure
    pub fn filter(name: impl Into<String>, source: anyhow::Error) -> Self {
        AdapterError::Filter {
            name: name.into(),
            source,
        }
    }
}

// =============================================================================
// Registration Errors
// =============================================================================

/// Errors detected while building descriptors or populating the registry
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Mutually exclusive options, invalid names, malformed specs
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Declared parameter specs do not line up with the callable signature
    #[error(
        "parameter name list ({names}) is not the same length as parameter type list ({types}) for \"{callable}\" of \"{model}\""
    )]
    SignatureMismatch {
        callable: String,
        model: String,
        names: usize,
        types: usize,
    },

    /// An identifier or path was registered twice
    #[error("Model '{identifier}' is already registered")]
    DuplicateRegistration { identifier: String },

    /// A referenced model identifier is not registered
    #[error("Unknown model '{identifier}', make sure it is registered")]
    UnknownModel { identifier: String },

    /// A host field kind has no adapter type
    #[error("Unsupported field type '{kind}', field: '{field}' model: '{model}'")]
    UnsupportedFieldType {
        kind: String,
        field: String,
        model: String,
    },

    /// A deferred reference still failed during finalization
    #[error("Unknown target model '{target}' make sure it is registered, field: '{field}' model: '{model}'")]
    UnresolvedReference {
        model: String,
        field: String,
        target: String,
    },

    /// A write was attempted after the registry was finalized
    #[error("Model registry is closed, cannot register '{identifier}'")]
    RegistryClosed { identifier: String },
}

impl RegistrationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RegistrationError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            RegistrationError::SignatureMismatch { .. } => "INVALID_CONFIGURATION",
            RegistrationError::DuplicateRegistration { .. } => "DUPLICATE_REGISTRATION",
            RegistrationError::UnknownModel { .. } => "UNKNOWN_MODEL",
            RegistrationError::UnsupportedFieldType { .. } => "UNSUPPORTED_FIELD_TYPE",
            RegistrationError::UnresolvedReference { .. } => "UNKNOWN_MODEL",
            RegistrationError::RegistryClosed { .. } => "REGISTRY_CLOSED",
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        RegistrationError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

// =============================================================================
// Value Errors
// =============================================================================

/// Errors raised while converting wire values
#[derive(Debug, Error)]
pub enum ValueError {
    /// A model token named an object that does not exist
    #[error("{model} with id '{id}' not found")]
    NotFound { model: String, id: String },

    /// The wire value does not fit the descriptor
    #[error("Invalid value for '{name}': {message}")]
    InvalidValue { name: String, message: String },
}

impl ValueError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValueError::NotFound { .. } => "NOT_FOUND",
            ValueError::InvalidValue { .. } => "INVALID_VALUE",
        }
    }

    pub(crate) fn invalid(name: &str, message: impl Into<String>) -> Self {
        ValueError::InvalidValue {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Field-keyed validation failures
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("Validation errors: {}", summary(.0))]
pub struct ValidationError(BTreeMap<String, Vec<String>>);

fn summary(fields: &BTreeMap<String, Vec<String>>) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field failure
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> std::result::Result<(), ValidationError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Opaque lower-level store failure; the original message is preserved
#[derive(Debug, Error)]
#[error("Store failure during {operation}: {message}")]
pub struct StorageError {
    pub operation: String,
    pub message: String,
}

impl StorageError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Transaction Errors
// =============================================================================

/// Transaction lifecycle misuse
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("cannot {operation} while transaction is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}
