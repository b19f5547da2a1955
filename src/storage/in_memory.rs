//! In-memory store for testing and development
//!
//! Tables are derived from host model definitions. Sessions read and write
//! the shared tables directly while autocommit is on; with autocommit off
//! they work on a private copy. `commit` publishes only the rows the session
//! touched, so concurrent sessions keep each other's committed work, and
//! `rollback` discards the copy.
//!
//! Auto-increment keys and stored files bypass the private copy: like a
//! database sequence and a file storage, they are never rolled back.

use crate::core::error::{StorageError, ValidationError};
use crate::core::field::{FieldType, FieldValue, FileValue};
use crate::core::host::{HostField, ModelDefinition};
use crate::core::store::{Instance, QuerySet, Session, Store, StoreEngine};
use crate::core::validation::validate_field;
use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Default)]
struct Tables {
    tables: HashMap<String, Table>,
    /// File name → content
    files: HashMap<String, Vec<u8>>,
}

#[derive(Debug, Clone)]
struct Table {
    fields: Vec<HostField>,
    /// Name of the primary key field
    pk_field: String,
    /// Integer keys are handed out by the store
    auto_key: bool,
    key_type: FieldType,
    rows: HashMap<String, Row>,
    next_id: i64,
}

#[derive(Debug, Clone)]
struct Row {
    pk: FieldValue,
    values: IndexMap<String, FieldValue>,
    /// Many-to-many field → associated keys
    related: HashMap<String, Vec<FieldValue>>,
}

impl Table {
    fn new(definition: &ModelDefinition) -> Self {
        let pk = definition.primary_key();
        let key_type = pk
            .and_then(|field| field.type_override.or_else(|| field.kind.field_type()))
            .unwrap_or(FieldType::Integer);
        Self {
            fields: definition.fields.clone(),
            pk_field: pk.map(|field| field.name.clone()).unwrap_or_else(|| "id".to_string()),
            auto_key: pk.is_none_or(|field| field.auto_created),
            key_type,
            rows: HashMap::new(),
            next_id: 1,
        }
    }

    fn parse_key(&self, raw: &str) -> Option<FieldValue> {
        match self.key_type {
            FieldType::Integer => raw.parse::<i64>().ok().map(FieldValue::Integer),
            FieldType::String => Some(FieldValue::String(raw.to_string())),
            _ => None,
        }
    }

    fn is_many_to_many(&self, name: &str) -> bool {
        self.fields
            .iter()
            .any(|field| field.name == name && field.is_many_to_many())
    }

    fn instance(&self, model: &str, row: &Row) -> Instance {
        let mut instance = Instance::new(model);
        instance.pk = Some(row.pk.clone());
        instance.values = row.values.clone();
        for field in self.fields.iter().filter(|field| field.is_many_to_many()) {
            let keys = row.related.get(&field.name).cloned().unwrap_or_default();
            instance.set(field.name.clone(), FieldValue::List(keys));
        }
        instance
    }
}

/// In-memory store implementation
///
/// Useful for testing and development. Uses RwLock for thread-safe access.
#[derive(Clone)]
pub struct InMemoryStore {
    engine: StoreEngine,
    file_base_url: String,
    data: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            engine: StoreEngine::InMemory,
            file_base_url: "/files/".to_string(),
            data: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// Report a different engine, e.g. `Sqlite` for the autocommit variant
    pub fn with_engine(mut self, engine: StoreEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Base URL stored files are served under
    pub fn with_file_base_url(mut self, url: impl Into<String>) -> Self {
        self.file_base_url = url.into();
        self
    }

    /// Create the table backing `definition`
    pub fn create_table(&self, definition: &ModelDefinition) -> Result<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let identifier = definition.identifier();
        if data.tables.contains_key(&identifier) {
            return Err(anyhow!("table '{}' already exists", identifier));
        }
        data.tables.insert(identifier, Table::new(definition));
        Ok(())
    }

    /// Number of committed rows in `model`'s table
    pub fn row_count(&self, model: &str) -> Result<usize> {
        let data = self
            .data
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(data.tables.get(model).map(|table| table.rows.len()).unwrap_or(0))
    }

    /// Committed content of a stored file
    pub fn file_content(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let data = self
            .data
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(data.files.get(name).cloned())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    fn engine(&self) -> StoreEngine {
        self.engine
    }

    fn session(&self) -> Box<dyn Session> {
        Box::new(InMemorySession {
            store: self.clone(),
            working: None,
            touched: BTreeSet::new(),
        })
    }
}

/// One connection to an [`InMemoryStore`]
pub struct InMemorySession {
    store: InMemoryStore,
    /// Private copy while autocommit is off
    working: Option<Tables>,
    /// (model, key) of every row written to the private copy
    touched: BTreeSet<(String, String)>,
}

impl InMemorySession {
    fn snapshot(&self) -> Result<Tables, StorageError> {
        self.store
            .data
            .read()
            .map(|data| data.clone())
            .map_err(|e| StorageError::new("read", format!("Failed to acquire read lock: {}", e)))
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R, StorageError> {
        if let Some(working) = &self.working {
            return Ok(f(working));
        }
        let data = self
            .store
            .data
            .read()
            .map_err(|e| StorageError::new("read", format!("Failed to acquire read lock: {}", e)))?;
        Ok(f(&data))
    }

    /// Hand out the next auto-increment key of `model` from the shared table
    fn allocate_key(&self, model: &str) -> Result<FieldValue, StorageError> {
        let mut data = self
            .store
            .data
            .write()
            .map_err(|e| StorageError::new("save", format!("Failed to acquire write lock: {}", e)))?;
        let table = table_mut(&mut data, model)?;
        let key = FieldValue::Integer(table.next_id);
        table.next_id += 1;
        Ok(key)
    }

    fn touch(&mut self, model: &str, key: &FieldValue) {
        if self.working.is_some() {
            self.touched.insert((model.to_string(), key.to_string()));
        }
    }

    fn write<R>(
        &mut self,
        f: impl FnOnce(&mut Tables) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        if let Some(working) = self.working.as_mut() {
            return f(working);
        }
        let mut data = self
            .store
            .data
            .write()
            .map_err(|e| StorageError::new("write", format!("Failed to acquire write lock: {}", e)))?;
        f(&mut data)
    }
}

fn table<'a>(tables: &'a Tables, model: &str) -> Result<&'a Table, StorageError> {
    tables
        .tables
        .get(model)
        .ok_or_else(|| StorageError::new("lookup", format!("no such table: {}", model)))
}

fn table_mut<'a>(tables: &'a mut Tables, model: &str) -> Result<&'a mut Table, StorageError> {
    tables
        .tables
        .get_mut(model)
        .ok_or_else(|| StorageError::new("lookup", format!("no such table: {}", model)))
}

impl Session for InMemorySession {
    fn set_autocommit(&mut self, enabled: bool) -> Result<(), StorageError> {
        self.working = if enabled { None } else { Some(self.snapshot()?) };
        self.touched.clear();
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let Some(working) = &self.working else {
            return Ok(());
        };
        let mut data = self
            .store
            .data
            .write()
            .map_err(|e| StorageError::new("commit", format!("Failed to acquire write lock: {}", e)))?;
        for (model, key) in std::mem::take(&mut self.touched) {
            let row = working
                .tables
                .get(&model)
                .and_then(|table| table.rows.get(&key))
                .cloned();
            let table = table_mut(&mut data, &model)?;
            match row {
                Some(row) => {
                    table.rows.insert(key, row);
                }
                None => {
                    table.rows.remove(&key);
                }
            }
        }

        // Pick up what other sessions committed meanwhile
        let refreshed = data.clone();
        drop(data);
        self.working = Some(refreshed);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        if self.working.is_some() {
            self.working = Some(self.snapshot()?);
        }
        self.touched.clear();
        Ok(())
    }

    fn parse_key(&self, model: &str, raw: &str) -> Option<FieldValue> {
        self.read(|tables| {
            tables
                .tables
                .get(model)
                .and_then(|table| table.parse_key(raw))
        })
        .ok()
        .flatten()
    }

    fn fetch(&mut self, model: &str, key: &FieldValue) -> Result<Option<Instance>, StorageError> {
        self.read(|tables| -> Result<Option<Instance>, StorageError> {
            let table = table(tables, model)?;
            Ok(table
                .rows
                .get(&key.to_string())
                .map(|row| table.instance(model, row)))
        })?
    }

    fn full_clean(&mut self, instance: &Instance) -> Result<(), ValidationError> {
        let fields = self
            .read(|tables| {
                tables
                    .tables
                    .get(&instance.model)
                    .map(|table| table.fields.clone())
            })
            .ok()
            .flatten()
            .unwrap_or_default();

        let mut errors = ValidationError::new();
        for field in fields.iter().filter(|field| !field.auto_created) {
            let value = instance.get(&field.name).or(field.default.as_ref());
            validate_field(field, value, &mut errors);
        }
        errors.into_result()
    }

    fn save(&mut self, instance: &mut Instance) -> Result<FieldValue, StorageError> {
        let model = instance.model.clone();
        let auto_key = self
            .read(|tables| tables.tables.get(&model).map(|table| table.auto_key))?
            .unwrap_or(false);
        let allocated = match instance.pk {
            None if auto_key => Some(self.allocate_key(&model)?),
            _ => None,
        };

        let key = self.write(|tables| {
            let table = table_mut(tables, &model)?;

            // Fill defaults for values never supplied
            for field in &table.fields {
                if field.is_many_to_many() || instance.values.contains_key(&field.name) {
                    continue;
                }
                if let Some(default) = &field.default {
                    instance.set(field.name.clone(), default.clone());
                }
            }

            let key = match (&instance.pk, allocated) {
                (Some(key), _) => key.clone(),
                (None, Some(key)) => {
                    instance.set(table.pk_field.clone(), key.clone());
                    key
                }
                (None, None) => {
                    let key = instance
                        .get(&table.pk_field)
                        .filter(|value| !value.is_null())
                        .cloned()
                        .ok_or_else(|| {
                            StorageError::new(
                                "save",
                                format!("NOT NULL constraint failed: {}.{}", model, table.pk_field),
                            )
                        })?;
                    if table.rows.contains_key(&key.to_string()) {
                        return Err(StorageError::new(
                            "save",
                            format!("UNIQUE constraint failed: {}.{}", model, table.pk_field),
                        ));
                    }
                    key
                }
            };

            let related = table
                .rows
                .get(&key.to_string())
                .map(|row| row.related.clone())
                .unwrap_or_default();
            let values: IndexMap<String, FieldValue> = instance
                .values
                .iter()
                .filter(|(name, _)| !table.is_many_to_many(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();

            table.rows.insert(
                key.to_string(),
                Row {
                    pk: key.clone(),
                    values,
                    related,
                },
            );
            Ok(key)
        })?;

        self.touch(&model, &key);
        instance.pk = Some(key.clone());
        Ok(key)
    }

    fn set_related(
        &mut self,
        instance: &mut Instance,
        field: &str,
        keys: Vec<FieldValue>,
    ) -> Result<(), StorageError> {
        let Some(pk) = instance.pk.clone() else {
            return Err(StorageError::new(
                "set_related",
                format!("'{}' needs a saved instance before '{}' can be set", instance.model, field),
            ));
        };
        let model = instance.model.clone();

        self.write(|tables| {
            let table = table_mut(tables, &model)?;
            if !table.is_many_to_many(field) {
                return Err(StorageError::new(
                    "set_related",
                    format!("'{}' is not a many-to-many field of '{}'", field, model),
                ));
            }
            let row = table.rows.get_mut(&pk.to_string()).ok_or_else(|| {
                StorageError::new("set_related", format!("{} row '{}' vanished", model, pk))
            })?;
            row.related.insert(field.to_string(), keys.clone());
            Ok(())
        })?;

        self.touch(&model, &pk);
        instance.set(field, FieldValue::List(keys));
        Ok(())
    }

    fn all(&mut self, model: &str) -> Result<QuerySet, StorageError> {
        self.read(|tables| -> Result<QuerySet, StorageError> {
            let table = table(tables, model)?;
            Ok(QuerySet::unordered(
                table.rows.values().map(|row| row.pk.clone()).collect(),
            ))
        })?
    }

    fn delete(&mut self, model: &str, key: &FieldValue) -> Result<bool, StorageError> {
        let deleted = self.write(|tables| {
            let table = table_mut(tables, model)?;
            Ok(table.rows.remove(&key.to_string()).is_some())
        })?;
        if deleted {
            self.touch(model, key);
        }
        Ok(deleted)
    }

    fn save_file(
        &mut self,
        model: &str,
        field: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<FileValue, StorageError> {
        self.read(|tables| table(tables, model).map(|_| ()))??;

        let mut data = self
            .store
            .data
            .write()
            .map_err(|e| StorageError::new("save_file", format!("Failed to acquire write lock: {}", e)))?;
        let mut name = filename.to_string();
        let mut suffix = 1;
        while data.files.contains_key(&name) {
            name = format!("{}_{}", filename, suffix);
            suffix += 1;
        }
        data.files.insert(name.clone(), content.to_vec());

        tracing::debug!(model = %model, field = %field, file = %name, "stored file");
        Ok(FileValue::Stored {
            url: format!("{}{}", self.store.file_base_url, name),
            name,
        })
    }
}
