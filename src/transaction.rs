//! Transactions over a model's store
//!
//! A [`Transaction`] owns one store session for the duration of one request.
//! It moves through `Idle → Active → {Committed, Aborted}`; every operation
//! requires `Active`.
//!
//! Engines without savepoint support get the autocommit variant: the
//! lifecycle calls only move the state machine and each operation is
//! committed on its own.

use crate::core::descriptor::{ActionContext, FieldDescriptor, ModelDescriptor};
use crate::core::error::{
    AdapterError, Result, StorageError, TransactionError, ValidationError, ValueError,
};
use crate::core::field::{FieldValue, FileValue, ValueMap};
use crate::core::query::ListPage;
use crate::core::store::{Instance, Session, Store, StoreEngine};
use std::fmt;
use std::sync::Arc;

/// Factory producing transactions bound to one model's store
#[derive(Clone)]
pub struct TransactionClass {
    engine: StoreEngine,
    store: Arc<dyn Store>,
}

impl TransactionClass {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            engine: store.engine(),
            store,
        }
    }

    pub fn engine(&self) -> StoreEngine {
        self.engine
    }

    /// Open an idle transaction on a fresh session
    pub fn new_transaction(&self) -> Transaction {
        let mode = if self.engine.supports_transactions() {
            TransactionMode::Atomic
        } else {
            TransactionMode::Autocommit
        };
        Transaction::new(self.store.session(), mode)
    }
}

impl fmt::Debug for TransactionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionClass")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Idle => "idle",
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::Aborted => "aborted",
        }
    }
}

/// How lifecycle calls reach the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// start/commit/abort drive the session's autocommit and rollback
    Atomic,
    /// Single statements are already atomic; lifecycle calls are no-ops
    Autocommit,
}

/// A bounded unit of store operations
pub struct Transaction {
    session: Box<dyn Session>,
    state: TransactionState,
    mode: TransactionMode,
}

impl Transaction {
    pub fn new(session: Box<dyn Session>, mode: TransactionMode) -> Self {
        Self {
            session,
            state: TransactionState::Idle,
            mode,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    // ===== Lifecycle =====

    pub fn start(&mut self) -> Result<()> {
        self.expect_state("start", TransactionState::Idle)?;
        if self.mode == TransactionMode::Atomic {
            self.session.set_autocommit(false)?;
        }
        self.state = TransactionState::Active;
        tracing::debug!(mode = ?self.mode, "transaction started");
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.expect_state("commit", TransactionState::Active)?;
        if self.mode == TransactionMode::Atomic {
            self.session.commit()?;
            self.session.set_autocommit(true)?;
        }
        self.state = TransactionState::Committed;
        tracing::debug!("transaction committed");
        Ok(())
    }

    pub fn abort(&mut self) -> Result<()> {
        self.expect_state("abort", TransactionState::Active)?;
        if self.mode == TransactionMode::Atomic {
            self.session.rollback()?;
            self.session.set_autocommit(true)?;
        }
        self.state = TransactionState::Aborted;
        tracing::debug!("transaction aborted");
        Ok(())
    }

    // ===== Operations =====

    /// Load one instance; malformed and missing ids are both `None`
    pub fn get(&mut self, model: &ModelDescriptor, id: &str) -> Result<Option<Instance>> {
        self.expect_state("get", TransactionState::Active)?;
        let Some(key) = self.session.parse_key(&model.identifier, id) else {
            return Ok(None);
        };
        Ok(self.session.fetch(&model.identifier, &key)?)
    }

    /// Create an instance and return its new key
    ///
    /// Multi-valued relations are set only after the instance is saved,
    /// since they need its key.
    pub fn create(&mut self, model: &ModelDescriptor, values: ValueMap) -> Result<(FieldValue, Instance)> {
        self.expect_state("create", TransactionState::Active)?;
        check_fields(model, &values, |field| field.mode.allows_create())?;

        let mut instance = Instance::new(model.identifier.clone());
        let related = split_related(model, values, &mut instance)?;

        self.session.full_clean(&instance)?;
        let key = self.session.save(&mut instance).map_err(store_failure)?;

        for (name, keys) in related {
            self.session
                .set_related(&mut instance, &name, keys)
                .map_err(store_failure)?;
        }

        tracing::debug!(model = %model.identifier, key = %key, "instance created");
        Ok((key, instance))
    }

    /// Update an instance; `None` when `id` does not resolve
    ///
    /// A non-null multi-valued relation replaces the whole association set,
    /// a null one leaves it untouched.
    pub fn update(&mut self, model: &ModelDescriptor, id: &str, values: ValueMap) -> Result<Option<Instance>> {
        self.expect_state("update", TransactionState::Active)?;
        let Some(key) = self.session.parse_key(&model.identifier, id) else {
            return Ok(None);
        };
        let Some(mut instance) = self.session.fetch(&model.identifier, &key)? else {
            return Ok(None);
        };
        check_fields(model, &values, |field| field.mode.allows_update())?;

        let related = split_related(model, values, &mut instance)?;

        self.session.full_clean(&instance)?;
        self.session.save(&mut instance).map_err(store_failure)?;

        for (name, keys) in related {
            self.session
                .set_related(&mut instance, &name, keys)
                .map_err(store_failure)?;
        }

        tracing::debug!(model = %model.identifier, key = %key, "instance updated");
        Ok(Some(instance))
    }

    /// One page of keys, from every instance or from a named filter
    ///
    /// Candidate sets without an inherent order are sorted by key first so
    /// paging is reproducible.
    pub fn list(
        &mut self,
        model: &ModelDescriptor,
        filter_name: Option<&str>,
        filter_values: &ValueMap,
        position: usize,
        count: usize,
    ) -> Result<ListPage> {
        self.expect_state("list", TransactionState::Active)?;

        let candidates = match filter_name {
            None => self.session.all(&model.identifier)?,
            Some(name) => {
                let filter = model.list_filter_map.get(name).ok_or_else(|| {
                    AdapterError::Internal(format!(
                        "filter '{}' not found for model '{}'",
                        name, model.identifier
                    ))
                })?;
                (filter.func)(&mut *self.session, filter_values)
                    .map_err(|e| AdapterError::filter(name, e))?
            }
        };

        let candidates = candidates.order_by_key();
        Ok(ListPage::new(
            candidates.window(position, count),
            position,
            candidates.len(),
        ))
    }

    /// `false` when nothing matched
    pub fn delete(&mut self, model: &ModelDescriptor, id: &str) -> Result<bool> {
        self.expect_state("delete", TransactionState::Active)?;
        let Some(key) = self.session.parse_key(&model.identifier, id) else {
            return Ok(false);
        };
        let deleted = self.session.delete(&model.identifier, &key).map_err(store_failure)?;
        if deleted {
            tracing::debug!(model = %model.identifier, key = %key, "instance deleted");
        }
        Ok(deleted)
    }

    /// Invoke an action of `model`
    ///
    /// Static actions take no target. Missing arguments take their declared
    /// defaults; missing required arguments and unknown names are validation
    /// failures.
    pub fn call(
        &mut self,
        model: &ModelDescriptor,
        action_name: &str,
        target_id: Option<&str>,
        mut args: ValueMap,
    ) -> Result<Option<FieldValue>> {
        self.expect_state("call", TransactionState::Active)?;
        let action = model.action(action_name).ok_or_else(|| {
            AdapterError::Internal(format!(
                "action '{}' not found for model '{}'",
                action_name, model.identifier
            ))
        })?;

        let mut errors = ValidationError::new();
        for name in args.keys() {
            if action.parameter(name).is_none() {
                errors.add(name, "Unknown parameter.");
            }
        }
        let mut bound = ValueMap::new();
        for param in &action.parameter_list {
            match args.shift_remove(&param.name) {
                Some(value) => {
                    bound.insert(param.name.clone(), value);
                }
                None => match &param.default {
                    Some(default) => {
                        bound.insert(param.name.clone(), default.clone());
                    }
                    None if param.required => errors.add(&param.name, "This parameter is required."),
                    None => {
                        bound.insert(param.name.clone(), FieldValue::Null);
                    }
                },
            }
        }
        errors.into_result()?;

        let mut target = if action.is_static {
            None
        } else {
            let id = target_id.unwrap_or_default();
            let instance = self.get(model, id)?.ok_or_else(|| ValueError::NotFound {
                model: model.path.clone(),
                id: id.to_string(),
            })?;
            Some(instance)
        };

        tracing::debug!(model = %model.identifier, action = %action.name, "calling action");
        let context = ActionContext {
            session: &mut *self.session,
            target: target.as_mut(),
            args: &bound,
        };
        (action.func)(context).map_err(|e| AdapterError::action(&action.name, e))
    }

    /// Persist uploaded content for a file field of `model`
    pub fn save_file(
        &mut self,
        model: &str,
        field: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<FileValue> {
        self.expect_state("save_file", TransactionState::Active)?;
        Ok(self
            .session
            .save_file(model, field, filename, content)
            .map_err(store_failure)?)
    }

    fn expect_state(&self, operation: &'static str, expected: TransactionState) -> Result<()> {
        if self.state != expected {
            return Err(TransactionError::InvalidState {
                operation,
                state: self.state.as_str(),
            }
            .into());
        }
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active && self.mode == TransactionMode::Atomic {
            tracing::warn!("transaction dropped while active, rolling back");
            if let Err(e) = self.session.rollback().and_then(|_| self.session.set_autocommit(true)) {
                tracing::warn!(error = %e, "rollback of dropped transaction failed");
            }
        }
    }
}

fn store_failure(error: StorageError) -> StorageError {
    tracing::warn!(operation = %error.operation, error = %error.message, "store failure");
    error
}

fn is_related_set(model: &ModelDescriptor, name: &str) -> bool {
    model.field(name).is_some_and(FieldDescriptor::is_related_set)
}

/// Reject unknown names, computed properties and fields the mode forbids
fn check_fields(
    model: &ModelDescriptor,
    values: &ValueMap,
    writable: impl Fn(&FieldDescriptor) -> bool,
) -> std::result::Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    for name in values.keys() {
        match model.field(name) {
            None => errors.add(name, "Unknown field."),
            Some(field) if !field.persisted || !writable(field) => {
                errors.add(name, "This field is read only.")
            }
            Some(_) => {}
        }
    }
    errors.into_result()
}

/// Move plain values onto `instance`, returning the non-null related sets as keys
fn split_related(
    model: &ModelDescriptor,
    values: ValueMap,
    instance: &mut Instance,
) -> std::result::Result<Vec<(String, Vec<FieldValue>)>, ValidationError> {
    let mut related = Vec::new();
    for (name, value) in values {
        if is_related_set(model, &name) {
            if !value.is_null() {
                let keys = related_keys(&name, value)?;
                related.push((name, keys));
            }
        } else {
            instance.set(name, value);
        }
    }
    Ok(related)
}

fn related_keys(field: &str, value: FieldValue) -> std::result::Result<Vec<FieldValue>, ValidationError> {
    match value {
        FieldValue::List(items) => Ok(items.into_iter().map(FieldValue::into_key).collect()),
        _ => Err(ValidationError::field(field, "Expected a list of references.")),
    }
}
