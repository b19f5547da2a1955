//! Configuration loading and management

use crate::core::auth::Verb;
use crate::core::field::FieldType;
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Computed (non-persisted) property exposed on a model
///
/// Accepts either a bare name, which becomes a String property, or a
/// detailed map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertySpec {
    Name(String),
    Detailed(PropertyDetail),
}

/// Detailed property declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetail {
    pub name: String,

    #[serde(default)]
    pub doc: Option<String>,

    #[serde(default = "default_property_type", rename = "type")]
    pub kind: FieldType,

    #[serde(default)]
    pub choices: Option<Vec<String>>,

    #[serde(default)]
    pub is_array: bool,

    /// Target model identifier for Model properties
    #[serde(default)]
    pub model: Option<String>,
}

fn default_property_type() -> FieldType {
    FieldType::String
}

impl PropertySpec {
    pub fn name(&self) -> &str {
        match self {
            PropertySpec::Name(name) => name,
            PropertySpec::Detailed(detail) => &detail.name,
        }
    }
}

/// Per-model registration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Fields left out of the descriptor (exclusive with `show_fields`)
    pub hide_fields: Vec<String>,

    /// Only these fields are exposed (exclusive with `hide_fields`)
    pub show_fields: Vec<String>,

    /// Computed properties appended after the persisted fields
    pub property_list: Vec<PropertySpec>,

    /// Fields forced to read-only
    pub read_only_fields: Vec<String>,

    pub constant_set_map: IndexMap<String, Vec<String>>,

    pub not_allowed_verbs: Vec<Verb>,

    /// Seconds the caller may cache DESCRIBE output
    pub cache_length: u64,

    /// Verb → policy (`public`, `authenticated`, `role:<name>`, ...)
    ///
    /// Used when the model has no predicate bound in code.
    pub auth: IndexMap<Verb, String>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            hide_fields: Vec::new(),
            show_fields: Vec::new(),
            property_list: Vec::new(),
            read_only_fields: Vec::new(),
            constant_set_map: IndexMap::new(),
            not_allowed_verbs: Vec::new(),
            cache_length: crate::core::descriptor::DEFAULT_CACHE_LENGTH,
            auth: IndexMap::new(),
        }
    }
}

impl ModelOptions {
    pub fn hide(mut self, fields: &[&str]) -> Self {
        self.hide_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn show(mut self, fields: &[&str]) -> Self {
        self.show_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn read_only(mut self, fields: &[&str]) -> Self {
        self.read_only_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn property(mut self, property: PropertySpec) -> Self {
        self.property_list.push(property);
        self
    }

    pub fn constant_set(mut self, name: &str, values: &[&str]) -> Self {
        self.constant_set_map
            .insert(name.to_string(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn not_allowed(mut self, verbs: &[Verb]) -> Self {
        self.not_allowed_verbs = verbs.to_vec();
        self
    }
}

/// Adapter configuration: identity plus per-model options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Namespace name, alphanumeric only
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub doc: String,

    /// Prefix every model path is placed under
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Model identifier → options
    #[serde(default)]
    pub models: IndexMap<String, ModelOptions>,
}

fn default_version() -> String {
    "0.0".to_string()
}

fn default_path_prefix() -> String {
    "/api/".to_string()
}

impl AdapterConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            doc: String::new(),
            path_prefix: default_path_prefix(),
            models: IndexMap::new(),
        }
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Options registered for `identifier`, defaults when absent
    pub fn options_for(&self, identifier: &str) -> ModelOptions {
        self.models.get(identifier).cloned().unwrap_or_default()
    }

    /// Merge several configurations
    ///
    /// Later configurations win: identity fields are taken from the last
    /// config that sets them, model options are replaced per identifier.
    pub fn merge(configs: Vec<AdapterConfig>) -> Option<AdapterConfig> {
        let mut iter = configs.into_iter();
        let mut merged = iter.next()?;

        for config in iter {
            if !config.name.is_empty() {
                merged.name = config.name;
            }
            if config.version != default_version() {
                merged.version = config.version;
            }
            if !config.doc.is_empty() {
                merged.doc = config.doc;
            }
            if config.path_prefix != default_path_prefix() {
                merged.path_prefix = config.path_prefix;
            }
            for (identifier, options) in config.models {
                if merged.models.contains_key(&identifier) {
                    tracing::debug!(model = %identifier, "model options overridden by later config");
                }
                merged.models.insert(identifier, options);
            }
        }

        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: inventory
version: "1.2"
doc: Stock keeping
models:
  inventory.Widget:
    hide_fields: [secret]
    property_list:
      - label
      - name: owner
        type: Model
        model: auth.User
    not_allowed_verbs: [DELETE]
    cache_length: 60
    auth:
      LIST: public
      UPDATE: "role:editor"
"#;

    #[test]
    fn test_yaml_parsing() {
        let config = AdapterConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.name, "inventory");
        assert_eq!(config.version, "1.2");
        assert_eq!(config.path_prefix, "/api/");

        let widget = config.options_for("inventory.Widget");
        assert_eq!(widget.hide_fields, vec!["secret"]);
        assert_eq!(widget.not_allowed_verbs, vec![Verb::Delete]);
        assert_eq!(widget.cache_length, 60);
        assert_eq!(widget.auth[&Verb::List], "public");
        assert_eq!(widget.auth[&Verb::Update], "role:editor");
        assert_eq!(widget.property_list[0], PropertySpec::Name("label".to_string()));
        match &widget.property_list[1] {
            PropertySpec::Detailed(detail) => {
                assert_eq!(detail.kind, FieldType::Model);
                assert_eq!(detail.model.as_deref(), Some("auth.User"));
            }
            other => panic!("Expected detailed property, got {:?}", other),
        }
    }

    #[test]
    fn test_options_defaults() {
        let config = AdapterConfig::from_yaml_str("name: inv").unwrap();
        let options = config.options_for("inventory.Unknown");
        assert_eq!(options.cache_length, 3600);
        assert!(options.hide_fields.is_empty());
        assert_eq!(config.version, "0.0");
    }

    #[test]
    fn test_yaml_serialization() {
        let config = AdapterConfig::from_yaml_str(YAML).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();

        // Should be able to parse it back
        let parsed = AdapterConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_merge_later_wins() {
        let base = AdapterConfig::from_yaml_str(YAML).unwrap();
        let mut overlay = AdapterConfig::new("inventory");
        overlay.models.insert(
            "inventory.Widget".to_string(),
            ModelOptions::default().read_only(&["name"]),
        );

        let merged = AdapterConfig::merge(vec![base, overlay]).unwrap();
        assert_eq!(merged.version, "1.2");
        assert_eq!(merged.doc, "Stock keeping");
        let widget = merged.options_for("inventory.Widget");
        assert_eq!(widget.read_only_fields, vec!["name"]);
        assert!(widget.hide_fields.is_empty());
    }

    #[test]
    fn test_merge_empty() {
        assert!(AdapterConfig::merge(Vec::new()).is_none());
    }
}
