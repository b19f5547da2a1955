//! Adapter façade: registration of models, actions, filters and predicates
//!
//! An [`Adapter`] owns one namespace. Models registered through it are built
//! into descriptors and placed in a shared [`ModelRegistry`]; once every
//! adapter is done, [`finalize`] settles deferred references, closes the
//! registry and produces one [`Namespace`] per adapter.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut registry = ModelRegistry::new();
//! let mut inventory = Adapter::new("inventory", "1.0", "Stock keeping")?;
//!
//! inventory.model(&mut registry, &widget)?;
//! inventory.model(&mut registry, &tag)?;
//! inventory.action(&mut registry, "inventory.Widget", restock)?;
//! inventory.check_auth("inventory.Widget", basic_auth_check("inventory", "Widget"))?;
//!
//! let registrations = finalize(registry, vec![inventory])?;
//! let namespace = registrations.namespace("inventory").unwrap();
//! ```

mod namespace;

pub use namespace::{ActionRegistration, ModelRegistration, Namespace};

use crate::builder::{ActionSpec, FilterSpec, build_action, build_filter, build_model, build_static_model};
use crate::config::{AdapterConfig, ModelOptions};
use crate::convert::Converter;
use crate::core::auth::{CheckAuth, check_auth_false, check_auth_true, policy_check};
use crate::core::error::RegistrationError;
use crate::core::host::ModelDefinition;
use crate::registry::{self, ModelRegistry};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Registration front-end for one namespace
pub struct Adapter {
    config: AdapterConfig,
    /// Identifiers of the models this adapter registered, in order
    models: Vec<String>,
    check_auth_map: HashMap<String, CheckAuth>,
    namespace_check_auth: CheckAuth,
}

impl Adapter {
    /// Create an adapter; `name` must be alphanumeric
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        doc: impl Into<String>,
    ) -> Result<Self, RegistrationError> {
        let mut config = AdapterConfig::new(name);
        config.version = version.into();
        config.doc = doc.into();
        Self::from_config(config)
    }

    /// Create an adapter from a loaded configuration
    pub fn from_config(config: AdapterConfig) -> Result<Self, RegistrationError> {
        let pattern = Regex::new(r"^[0-9a-zA-Z]*$")
            .map_err(|e| RegistrationError::invalid(format!("name pattern: {}", e)))?;
        if !pattern.is_match(&config.name) {
            return Err(RegistrationError::invalid(format!(
                "name \"{}\" is invalid",
                config.name
            )));
        }

        Ok(Self {
            config,
            models: Vec::new(),
            check_auth_map: HashMap::new(),
            namespace_check_auth: check_auth_true(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn doc(&self) -> &str {
        &self.config.doc
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Path every model of this namespace lives under
    pub fn namespace_path(&self) -> String {
        format!("{}{}/", self.config.path_prefix, self.config.name)
    }

    /// Whether `identifier` was registered through this adapter
    pub fn owns(&self, identifier: &str) -> bool {
        self.models.iter().any(|model| model == identifier)
    }

    // ===== Registration =====

    /// Register a host model with the options configured for it
    pub fn model(
        &mut self,
        registry: &mut ModelRegistry,
        definition: &ModelDefinition,
    ) -> Result<String, RegistrationError> {
        let options = self.config.options_for(&definition.identifier());
        self.model_with(registry, definition, &options)
    }

    /// Register a host model with explicit options
    pub fn model_with(
        &mut self,
        registry: &mut ModelRegistry,
        definition: &ModelDefinition,
        options: &ModelOptions,
    ) -> Result<String, RegistrationError> {
        let descriptor = build_model(definition, options, registry, &self.namespace_path())?;
        self.register(registry, descriptor)
    }

    /// Register a field-less model hosting static actions only
    pub fn static_model(
        &mut self,
        registry: &mut ModelRegistry,
        definition: &ModelDefinition,
    ) -> Result<String, RegistrationError> {
        let options = self.config.options_for(&definition.identifier());
        let descriptor = build_static_model(definition, &options, &self.namespace_path());
        self.register(registry, descriptor)
    }

    /// Attach an action to a model of this adapter
    pub fn action(
        &mut self,
        registry: &mut ModelRegistry,
        model: &str,
        spec: ActionSpec,
    ) -> Result<(), RegistrationError> {
        self.ensure_owned(model)?;
        let action = build_action(model, spec, registry)?;

        let descriptor = registry.get_mut(model)?;
        if descriptor.action(&action.name).is_some() {
            return Err(RegistrationError::invalid(format!(
                "action \"{}\" is already registered for \"{}\"",
                action.name, model
            )));
        }
        tracing::debug!(model = %model, action = %action.name, "registering action");
        descriptor.action_list.push(action);
        Ok(())
    }

    /// Attach a named list filter to a model of this adapter
    pub fn list_filter(
        &mut self,
        registry: &mut ModelRegistry,
        model: &str,
        spec: FilterSpec,
    ) -> Result<(), RegistrationError> {
        self.ensure_owned(model)?;
        let (name, filter) = build_filter(model, spec, registry)?;

        let descriptor = registry.get_mut(model)?;
        if descriptor.list_filter_map.contains_key(&name) {
            return Err(RegistrationError::invalid(format!(
                "list filter \"{}\" is already registered for \"{}\"",
                name, model
            )));
        }
        tracing::debug!(model = %model, filter = %name, "registering list filter");
        descriptor.list_filter_map.insert(name, filter);
        Ok(())
    }

    /// Bind the authorization predicate of a model of this adapter
    ///
    /// The model's actions share it; they receive their name in the target.
    pub fn check_auth(&mut self, model: &str, check: CheckAuth) -> Result<(), RegistrationError> {
        self.ensure_owned(model)?;
        if self.check_auth_map.insert(model.to_string(), check).is_some() {
            tracing::warn!(model = %model, "authorization predicate replaced");
        }
        Ok(())
    }

    /// Predicate for namespace-level requests; allows everything by default
    pub fn namespace_check_auth(&mut self, check: CheckAuth) {
        self.namespace_check_auth = check;
    }

    fn register(
        &mut self,
        registry: &mut ModelRegistry,
        descriptor: crate::core::descriptor::ModelDescriptor,
    ) -> Result<String, RegistrationError> {
        let identifier = descriptor.identifier.clone();
        registry.register(descriptor)?;
        self.models.push(identifier.clone());
        tracing::info!(namespace = %self.config.name, model = %identifier, "model registered");
        Ok(identifier)
    }

    fn ensure_owned(&self, model: &str) -> Result<(), RegistrationError> {
        if !self.owns(model) {
            return Err(RegistrationError::UnknownModel {
                identifier: model.to_string(),
            });
        }
        Ok(())
    }

    fn into_namespace(mut self, registry: &Arc<ModelRegistry>) -> Result<Namespace, RegistrationError> {
        let mut namespace = Namespace::new(
            self.config.name.clone(),
            self.config.version.clone(),
            self.config.doc.clone(),
            self.namespace_path(),
            Converter::new(registry.clone()),
        )
        .with_check_auth(self.namespace_check_auth.clone());

        for identifier in &self.models {
            let descriptor = Arc::new(registry.resolve(identifier)?.clone());
            let check = match self.check_auth_map.remove(identifier) {
                Some(check) => check,
                None => {
                    let options = self.config.options_for(identifier);
                    if options.auth.is_empty() {
                        check_auth_false()
                    } else {
                        policy_check(&options.auth)
                    }
                }
            };
            namespace.add_model(ModelRegistration::new(descriptor, check));
        }
        Ok(namespace)
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.config.name)
            .field("version", &self.config.version)
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

/// Outcome of the registration phase
#[derive(Debug)]
pub struct Registrations {
    /// Closed registry shared by every namespace
    pub registry: Arc<ModelRegistry>,
    pub namespaces: Vec<Namespace>,
}

impl Registrations {
    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.iter().find(|namespace| namespace.name() == name)
    }

    /// Find a model across namespaces by its wire path
    pub fn model_by_path(&self, path: &str) -> Option<&ModelRegistration> {
        self.namespaces
            .iter()
            .find_map(|namespace| namespace.model_by_path(path))
    }

    /// Make the registry reachable through [`registry::global`]
    pub fn install_global(&self) -> Result<(), RegistrationError> {
        registry::install_global(self.registry.clone())
    }
}

/// Close the registration phase
///
/// Every pending model reference is settled first; any reference left
/// unresolved aborts with [`RegistrationError::UnresolvedReference`].
pub fn finalize(
    mut registry: ModelRegistry,
    adapters: Vec<Adapter>,
) -> Result<Registrations, RegistrationError> {
    let mut names: Vec<&str> = Vec::new();
    for adapter in &adapters {
        if names.contains(&adapter.name()) {
            return Err(RegistrationError::DuplicateRegistration {
                identifier: adapter.name().to_string(),
            });
        }
        names.push(adapter.name());
    }

    registry.finalize()?;
    let registry = Arc::new(registry);

    let namespaces = adapters
        .into_iter()
        .map(|adapter| adapter.into_namespace(&registry))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Registrations {
        registry,
        namespaces,
    })
}
