//! SheetPilot: a spreadsheet cleaning pipeline.
//!
//! Files are loaded into a [`core::DataFrame`], passed through a sequence of
//! [`core::CleaningModule`]s by the [`engine::Orchestrator`], and written back
//! out. Modules register themselves with `#[derive(CleaningModule)]` and are
//! discovered through [`registry::ModuleRegistry`].

pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod io;
pub mod modules;
pub mod plugins;
pub mod registry;

pub use crate::core::{CleaningModule, Column, DataFrame, ModuleContext, Value};
pub use crate::engine::{ModuleConfig, Orchestrator, Report};
pub use crate::error::CleanError;
pub use crate::registry::ModuleRegistry;
