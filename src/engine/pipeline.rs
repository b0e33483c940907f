use super::orchestrator::ModuleConfig;
use crate::registry::ModuleRegistry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// A saved pipeline: `{"stop_on_error": bool?, "steps": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_on_error: Option<bool>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub module: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl StepConfig {
    pub fn new(module: impl Into<String>, params: Value) -> Self {
        Self {
            module: module.into(),
            params,
            enabled: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(config: Value) -> Result<Self> {
        serde_json::from_value(config).context("Invalid pipeline config")
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
        let config: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse pipeline config {}", path.display()))?;
        Self::from_json(config)
    }

    /// Instantiate each step from the registry. Unknown modules are skipped.
    pub fn build_steps(&self, registry: &ModuleRegistry) -> Vec<ModuleConfig> {
        self.steps
            .iter()
            .filter_map(|step| match registry.get_module(&step.module) {
                Some(module) => Some(
                    ModuleConfig::new(step.module.clone(), module, step.params.clone())
                        .enabled(step.enabled),
                ),
                None => {
                    log::warn!("Unknown module '{}' in pipeline config, skipping", step.module);
                    None
                }
            })
            .collect()
    }
}
