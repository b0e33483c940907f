use crate::core::CleaningModule;
use serde::{Deserialize, Serialize};

/// Schema for a configurable parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub default: serde_json::Value,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Whether a module ships with the crate or is an add-on plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Builtin,
    Plugin,
}

/// Factory function type for creating module instances
pub type ModuleFactory = fn() -> Box<dyn CleaningModule>;

/// Complete metadata for a module type
#[derive(Clone)]
pub struct ModuleMetadata {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub kind: ModuleKind,
    pub parameters: Vec<ParameterSchema>,
    pub factory: ModuleFactory,
}

impl ModuleMetadata {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        factory: ModuleFactory,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            description: String::new(),
            kind: ModuleKind::Plugin,
            parameters: Vec::new(),
            factory,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn add_parameter(mut self, param: ParameterSchema) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSchema> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Create a new, unconfigured instance of this module type
    pub fn create_instance(&self) -> Box<dyn CleaningModule> {
        (self.factory)()
    }
}

impl std::fmt::Debug for ModuleMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleMetadata")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("kind", &self.kind)
            .field("parameters", &self.parameters)
            .finish()
    }
}

// Factory type for creating module metadata at runtime
pub type ModuleMetadataFactory = fn() -> ModuleMetadata;

// Wrapper for inventory collection
pub struct ModuleMetadataFactoryWrapper(pub ModuleMetadataFactory);

inventory::collect!(ModuleMetadataFactoryWrapper);
