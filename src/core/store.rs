//! Store boundary
//!
//! The adapter issues store-level operations through these traits but never
//! implements indexing, joins or persistence itself. A [`Store`] hands out one
//! [`Session`] per request; sessions are never shared between callers.

use crate::core::error::{StorageError, ValidationError};
use crate::core::field::{FieldValue, FileValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Storage engine behind a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreEngine {
    Postgres,
    Mysql,
    /// No savepoints: multi-step transactions are not attempted
    Sqlite,
    InMemory,
}

impl StoreEngine {
    /// Whether explicit start/commit/abort is meaningful on this engine
    pub fn supports_transactions(&self) -> bool {
        !matches!(self, StoreEngine::Sqlite)
    }
}

/// A loaded or new model instance
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Instance {
    /// Registry identifier of the instance's model
    pub model: String,
    /// `None` until the store has saved it
    pub pk: Option<FieldValue>,
    pub values: IndexMap<String, FieldValue>,
}

impl Instance {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            pk: None,
            values: IndexMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.values.insert(field.into(), value);
    }
}

/// Candidate set of primary keys produced by a listing or filter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySet {
    keys: Vec<FieldValue>,
    ordered: bool,
}

impl QuerySet {
    /// Keys in no particular order
    pub fn unordered(keys: Vec<FieldValue>) -> Self {
        Self {
            keys,
            ordered: false,
        }
    }

    /// Keys whose order was chosen by the producer (e.g. an explicit sort)
    pub fn ordered(keys: Vec<FieldValue>) -> Self {
        Self {
            keys,
            ordered: true,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[FieldValue] {
        &self.keys
    }

    /// Impose the stable key ordering unless the producer already ordered it
    pub fn order_by_key(mut self) -> Self {
        if !self.ordered {
            self.keys.sort_by(|a, b| a.key_cmp(b));
            self.ordered = true;
        }
        self
    }

    /// Keys in `[position, position + count)`
    pub fn window(&self, position: usize, count: usize) -> Vec<FieldValue> {
        self.keys.iter().skip(position).take(count).cloned().collect()
    }
}

/// A storage engine able to open request-scoped sessions
pub trait Store: Send + Sync {
    fn engine(&self) -> StoreEngine;

    /// Open a new session bound to its own connection
    fn session(&self) -> Box<dyn Session>;
}

/// One connection to the store, owned by one transaction
pub trait Session: Send {
    fn set_autocommit(&mut self, enabled: bool) -> Result<(), StorageError>;

    fn commit(&mut self) -> Result<(), StorageError>;

    fn rollback(&mut self) -> Result<(), StorageError>;

    /// Parse a raw identifier into the model's key type; `None` when malformed
    fn parse_key(&self, model: &str, raw: &str) -> Option<FieldValue>;

    fn fetch(&mut self, model: &str, key: &FieldValue) -> Result<Option<Instance>, StorageError>;

    /// Host-side validation of a complete instance before saving
    fn full_clean(&mut self, instance: &Instance) -> Result<(), ValidationError>;

    /// Insert or update; returns the primary key and sets `instance.pk`
    fn save(&mut self, instance: &mut Instance) -> Result<FieldValue, StorageError>;

    /// Replace the association set of a many-to-many field on a saved instance
    fn set_related(
        &mut self,
        instance: &mut Instance,
        field: &str,
        keys: Vec<FieldValue>,
    ) -> Result<(), StorageError>;

    /// Every instance key of `model`
    fn all(&mut self, model: &str) -> Result<QuerySet, StorageError>;

    /// `false` when nothing matched
    fn delete(&mut self, model: &str, key: &FieldValue) -> Result<bool, StorageError>;

    /// Persist uploaded content for a file field
    fn save_file(
        &mut self,
        model: &str,
        field: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<FileValue, StorageError>;

    /// Keys of instances matching `predicate`, in the store's listing order
    fn filter(
        &mut self,
        model: &str,
        predicate: &dyn Fn(&Instance) -> bool,
    ) -> Result<QuerySet, StorageError> {
        let all = self.all(model)?;
        let mut keys = Vec::new();
        for key in all.keys() {
            if let Some(instance) = self.fetch(model, key)? {
                if predicate(&instance) {
                    keys.push(key.clone());
                }
            }
        }
        Ok(if all.is_ordered() {
            QuerySet::ordered(keys)
        } else {
            QuerySet::unordered(keys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_transactions() {
        assert!(StoreEngine::Postgres.supports_transactions());
        assert!(StoreEngine::InMemory.supports_transactions());
        assert!(!StoreEngine::Sqlite.supports_transactions());
    }

    #[test]
    fn test_queryset_orders_unordered_keys() {
        let qs = QuerySet::unordered(vec![
            FieldValue::Integer(3),
            FieldValue::Integer(1),
            FieldValue::Integer(2),
        ])
        .order_by_key();
        assert!(qs.is_ordered());
        assert_eq!(
            qs.window(0, 10),
            vec![
                FieldValue::Integer(1),
                FieldValue::Integer(2),
                FieldValue::Integer(3)
            ]
        );
    }

    #[test]
    fn test_queryset_keeps_explicit_order() {
        let qs = QuerySet::ordered(vec![FieldValue::Integer(3), FieldValue::Integer(1)])
            .order_by_key();
        assert_eq!(qs.keys(), &[FieldValue::Integer(3), FieldValue::Integer(1)]);
    }

    #[test]
    fn test_queryset_window_past_end() {
        let qs = QuerySet::ordered(vec![FieldValue::Integer(1)]);
        assert!(qs.window(5, 10).is_empty());
        assert_eq!(qs.window(0, 0).len(), 0);
    }

    #[test]
    fn test_instance_values() {
        let mut instance = Instance::new("inventory.Widget");
        assert!(instance.pk.is_none());
        instance.set("name", "A".into());
        assert_eq!(instance.get("name"), Some(&FieldValue::from("A")));
        assert_eq!(instance.get("missing"), None);
    }
}
