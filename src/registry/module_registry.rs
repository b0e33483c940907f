use super::{ModuleKind, ModuleMetadata, ModuleMetadataFactoryWrapper};
use crate::core::CleaningModule;
use std::collections::BTreeMap;

/// Registry of available cleaning modules and plugins
pub struct ModuleRegistry {
    modules: BTreeMap<String, ModuleMetadata>,
}

impl ModuleRegistry {
    /// Collect every module registered through `#[derive(CleaningModule)]`.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for wrapper in inventory::iter::<ModuleMetadataFactoryWrapper> {
            registry.register((wrapper.0)());
        }
        log::debug!("Module registry loaded {} modules", registry.modules.len());
        registry
    }

    pub fn empty() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// Add or replace a module type.
    pub fn register(&mut self, metadata: ModuleMetadata) {
        if self.modules.contains_key(&metadata.id) {
            log::warn!("Module '{}' registered twice; keeping the latest", metadata.id);
        }
        self.modules.insert(metadata.id.clone(), metadata);
    }

    /// Fresh instance of the named module, if registered.
    pub fn get_module(&self, name: &str) -> Option<Box<dyn CleaningModule>> {
        self.modules.get(name).map(ModuleMetadata::create_instance)
    }

    pub fn metadata(&self, name: &str) -> Option<&ModuleMetadata> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// All registered modules, sorted by id.
    pub fn list_modules(&self) -> Vec<&ModuleMetadata> {
        self.modules.values().collect()
    }

    pub fn list_by_kind(&self, kind: ModuleKind) -> Vec<&ModuleMetadata> {
        self.modules.values().filter(|m| m.kind == kind).collect()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
