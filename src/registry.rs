//! Model registry
//!
//! Maps fully-qualified model identifiers (`module.Name`) to their
//! descriptors, and wire paths back to identifiers.
//!
//! Host models may reference each other in any order, including circularly.
//! References to a model that is not registered yet are kept as
//! [`ModelRef::Pending`] and settled once, by [`ModelRegistry::finalize`],
//! after every model is known. From then on the registry is `Closed`:
//! writes are rejected and it is shared read-only behind an `Arc`.

use crate::core::descriptor::{ModelDescriptor, ModelRef};
use crate::core::error::RegistrationError;
use crate::core::field::FieldType;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Lifecycle phase of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryPhase {
    /// Accepting registrations
    #[default]
    Open,
    /// Finalized, read-only
    Closed,
}

/// Registry of every model descriptor known to the process
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    /// Identifier → descriptor, in registration order
    models: IndexMap<String, ModelDescriptor>,
    /// Wire path → identifier
    paths: HashMap<String, String>,
    phase: RegistryPhase,
}

impl ModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RegistryPhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == RegistryPhase::Closed
    }

    /// Register a model descriptor
    ///
    /// Identifiers and paths are write-once.
    pub fn register(&mut self, descriptor: ModelDescriptor) -> Result<(), RegistrationError> {
        self.ensure_open(&descriptor.identifier)?;

        if self.models.contains_key(&descriptor.identifier) {
            return Err(RegistrationError::DuplicateRegistration {
                identifier: descriptor.identifier,
            });
        }
        if let Some(existing) = self.paths.get(&descriptor.path) {
            return Err(RegistrationError::DuplicateRegistration {
                identifier: existing.clone(),
            });
        }

        tracing::debug!(
            model = %descriptor.identifier,
            path = %descriptor.path,
            "registering model"
        );

        self.paths
            .insert(descriptor.path.clone(), descriptor.identifier.clone());
        self.models.insert(descriptor.identifier.clone(), descriptor);
        Ok(())
    }

    /// Look up a descriptor by identifier
    pub fn resolve(&self, identifier: &str) -> Result<&ModelDescriptor, RegistrationError> {
        self.models
            .get(identifier)
            .ok_or_else(|| RegistrationError::UnknownModel {
                identifier: identifier.to_string(),
            })
    }

    /// Look up a descriptor by its wire path
    pub fn resolve_path(&self, path: &str) -> Option<&ModelDescriptor> {
        self.paths
            .get(path)
            .and_then(|identifier| self.models.get(identifier))
    }

    /// Mutable access while registration is still open
    pub fn get_mut(&mut self, identifier: &str) -> Result<&mut ModelDescriptor, RegistrationError> {
        self.ensure_open(identifier)?;
        self.models
            .get_mut(identifier)
            .ok_or_else(|| RegistrationError::UnknownModel {
                identifier: identifier.to_string(),
            })
    }

    /// Optimistic resolution: `Resolved` when the target is already known,
    /// `Pending` otherwise
    pub fn reference(&self, identifier: &str) -> ModelRef {
        match self.models.get(identifier) {
            Some(descriptor) => ModelRef::Resolved {
                identifier: identifier.to_string(),
                path: descriptor.path.clone(),
            },
            None => {
                tracing::debug!(target_model = %identifier, "deferring model reference");
                ModelRef::pending(identifier)
            }
        }
    }

    /// Resolve a possibly-pending reference against the current registry
    pub fn resolve_late(&self, model_ref: &ModelRef) -> Result<ModelRef, RegistrationError> {
        let identifier = model_ref.identifier();
        let descriptor = self.resolve(identifier)?;
        Ok(ModelRef::Resolved {
            identifier: identifier.to_string(),
            path: descriptor.path.clone(),
        })
    }

    /// Settle every pending reference and close the registry
    ///
    /// Walks fields, computed properties, action parameters and return
    /// values, and filter parameters. A reference whose target is still
    /// unknown aborts with [`RegistrationError::UnresolvedReference`] naming
    /// the model, the field and the target.
    pub fn finalize(&mut self) -> Result<(), RegistrationError> {
        if self.is_closed() {
            return Ok(());
        }

        let index: HashMap<String, String> = self
            .models
            .iter()
            .map(|(identifier, descriptor)| (identifier.clone(), descriptor.path.clone()))
            .collect();

        let mut settled = 0usize;
        for (identifier, descriptor) in self.models.iter_mut() {
            for (name, field) in descriptor.field_map.iter_mut() {
                let kind = field.parameter.kind;
                settled += settle(&index, identifier, name, kind, &mut field.parameter.model)?;
            }

            for action in descriptor.action_list.iter_mut() {
                for param in action.parameter_list.iter_mut() {
                    let location = format!("{}({})", action.name, param.name);
                    settled += settle(&index, identifier, &location, param.kind, &mut param.model)?;
                }
                if let Some(ret) = action.return_parameter.as_mut() {
                    let location = format!("{}(return)", action.name);
                    settled += settle(&index, identifier, &location, ret.kind, &mut ret.model)?;
                }
            }

            for (filter_name, filter) in descriptor.list_filter_map.iter_mut() {
                for (name, param) in filter.parameter_map.iter_mut() {
                    let location = format!("{}({})", filter_name, name);
                    settled += settle(&index, identifier, &location, param.kind, &mut param.model)?;
                }
            }
        }

        self.phase = RegistryPhase::Closed;
        tracing::info!(
            models = self.models.len(),
            deferred = settled,
            "model registry finalized"
        );
        Ok(())
    }

    /// All registered identifiers, in registration order
    pub fn identifiers(&self) -> Vec<&str> {
        self.models.keys().map(|s| s.as_str()).collect()
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    fn ensure_open(&self, identifier: &str) -> Result<(), RegistrationError> {
        if self.is_closed() {
            return Err(RegistrationError::RegistryClosed {
                identifier: identifier.to_string(),
            });
        }
        Ok(())
    }
}

/// Resolve one reference slot in place; returns 1 when it was pending
fn settle(
    index: &HashMap<String, String>,
    model: &str,
    field: &str,
    kind: FieldType,
    slot: &mut Option<ModelRef>,
) -> Result<usize, RegistrationError> {
    let pending = match slot {
        Some(ModelRef::Pending { identifier }) => identifier.clone(),
        Some(ModelRef::Resolved { .. }) => return Ok(0),
        None if kind == FieldType::Model => {
            return Err(RegistrationError::UnresolvedReference {
                model: model.to_string(),
                field: field.to_string(),
                target: String::new(),
            });
        }
        None => return Ok(0),
    };

    let path = index
        .get(&pending)
        .ok_or_else(|| RegistrationError::UnresolvedReference {
            model: model.to_string(),
            field: field.to_string(),
            target: pending.clone(),
        })?;

    *slot = Some(ModelRef::Resolved {
        identifier: pending,
        path: path.clone(),
    });
    Ok(1)
}

static GLOBAL_REGISTRY: OnceLock<Arc<ModelRegistry>> = OnceLock::new();

/// Install the process-wide registry; only a closed registry, only once
pub fn install_global(registry: Arc<ModelRegistry>) -> Result<(), RegistrationError> {
    if !registry.is_closed() {
        return Err(RegistrationError::invalid(
            "only a finalized model registry can be installed globally",
        ));
    }
    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| RegistrationError::invalid("global model registry is already installed"))
}

/// The process-wide registry, if one was installed
pub fn global() -> Option<Arc<ModelRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}
