pub mod dataframe;
pub mod generation;
pub mod module;
pub mod stats;
pub mod value;

pub use dataframe::{Column, ColumnKind, DataFrame};
pub use generation::{GenerationRequest, TextGenerator};
pub use module::{CleaningModule, ModuleContext};
pub use value::Value;
