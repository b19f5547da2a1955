//! Finalized namespaces handed to the protocol layer

use crate::convert::Converter;
use crate::core::auth::{AuthContext, AuthTarget, CheckAuth, Verb};
use crate::core::descriptor::{ActionDescriptor, ModelDescriptor};
use crate::transaction::Transaction;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// One adapter's models, ready to serve requests
pub struct Namespace {
    name: String,
    version: String,
    doc: String,
    path: String,
    converter: Converter,
    check_auth: CheckAuth,
    /// Model name → registration, in registration order
    models: IndexMap<String, ModelRegistration>,
}

impl Namespace {
    pub(crate) fn new(
        name: String,
        version: String,
        doc: String,
        path: String,
        converter: Converter,
    ) -> Self {
        Self {
            name,
            version,
            doc,
            path,
            converter,
            check_auth: crate::core::auth::check_auth_true(),
            models: IndexMap::new(),
        }
    }

    pub(crate) fn with_check_auth(mut self, check: CheckAuth) -> Self {
        self.check_auth = check;
        self
    }

    pub(crate) fn add_model(&mut self, model: ModelRegistration) {
        self.models.insert(model.descriptor.name.clone(), model);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn model(&self, name: &str) -> Option<&ModelRegistration> {
        self.models.get(name)
    }

    pub fn model_by_path(&self, path: &str) -> Option<&ModelRegistration> {
        self.models
            .values()
            .find(|model| model.descriptor.path == path)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelRegistration> {
        self.models.values()
    }

    /// Whether `actor` may DESCRIBE the namespace itself
    pub fn authorize(&self, actor: &AuthContext) -> bool {
        (self.check_auth)(actor, Verb::Describe, &AuthTarget::default())
    }

    /// Navigable metadata for DESCRIBE
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "version": self.version,
            "doc": self.doc,
            "path": self.path,
            "models": self.models.values().map(|m| m.descriptor.path.as_str()).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("path", &self.path)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A model descriptor bound to its authorization predicate
#[derive(Clone)]
pub struct ModelRegistration {
    pub descriptor: Arc<ModelDescriptor>,
    check_auth: CheckAuth,
    actions: IndexMap<String, ActionRegistration>,
}

impl ModelRegistration {
    pub(crate) fn new(descriptor: Arc<ModelDescriptor>, check_auth: CheckAuth) -> Self {
        let call_allowed = descriptor.allows(Verb::Call);
        let actions = descriptor
            .action_list
            .iter()
            .map(|action| {
                (
                    action.name.clone(),
                    ActionRegistration {
                        descriptor: action.clone(),
                        check_auth: check_auth.clone(),
                        call_allowed,
                    },
                )
            })
            .collect();
        Self {
            descriptor,
            check_auth,
            actions,
        }
    }

    /// Whether `actor` may apply `verb` to the instances in `id_list`
    ///
    /// Verbs the model disallows are refused before the predicate runs.
    pub fn authorize(&self, actor: &AuthContext, verb: Verb, id_list: &[String]) -> bool {
        if !self.descriptor.allows(verb) {
            tracing::debug!(model = %self.descriptor.identifier, verb = %verb, "verb not allowed");
            return false;
        }
        (self.check_auth)(actor, verb, &AuthTarget::ids(id_list))
    }

    pub fn action(&self, name: &str) -> Option<&ActionRegistration> {
        self.actions.get(name)
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionRegistration> {
        self.actions.values()
    }

    /// Open an idle transaction on the model's store
    pub fn new_transaction(&self) -> Transaction {
        self.descriptor.transaction_class.new_transaction()
    }
}

impl fmt::Debug for ModelRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistration")
            .field("model", &self.descriptor.identifier)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// An action descriptor bound to its model's predicate
#[derive(Clone)]
pub struct ActionRegistration {
    pub descriptor: ActionDescriptor,
    check_auth: CheckAuth,
    /// CALL is not among the owning model's disallowed verbs
    call_allowed: bool,
}

impl ActionRegistration {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Whether `actor` may CALL this action on the instances in `id_list`
    ///
    /// Refused before the predicate runs when the model disallows CALL.
    pub fn authorize(&self, actor: &AuthContext, id_list: &[String]) -> bool {
        if !self.call_allowed {
            tracing::debug!(action = %self.descriptor.name, "CALL not allowed");
            return false;
        }
        let target = AuthTarget {
            id_list,
            action: Some(self.descriptor.name.as_str()),
        };
        (self.check_auth)(actor, Verb::Call, &target)
    }
}

impl fmt::Debug for ActionRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistration")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
