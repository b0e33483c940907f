//! Add-on cleaning modules.
//!
//! Plugins register through the same derive as built-in modules but are
//! tagged `ModuleKind::Plugin` so front ends can list them separately.

pub mod intelligent_text_normalizer;

pub use intelligent_text_normalizer::IntelligentTextNormalizer;
