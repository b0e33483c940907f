pub mod metadata;
pub mod module_registry;

pub use metadata::{
    ModuleFactory, ModuleKind, ModuleMetadata, ModuleMetadataFactory,
    ModuleMetadataFactoryWrapper, ParameterSchema,
};
pub use module_registry::ModuleRegistry;
