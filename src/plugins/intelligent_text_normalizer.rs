use crate::audit::{AuditAction, Outcome};
use crate::core::{CleaningModule, DataFrame, GenerationRequest, ModuleContext, Value};
use crate::error::CleanError;
use crate::modules::{columns, parse_params};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sheetpilot_macros::CleaningModule;

pub const MODULE_ID: &str = "intelligent_text_normalizer";

const OUTPUT_CUE: &str = "Normalized text:";
const PREVIEW_ROWS: usize = 5;

/// Rewrites text cells with a generative model following free-form rules.
///
/// Without rules or without a [`TextGenerator`](crate::core::TextGenerator)
/// in the context, the input is passed through unchanged.
#[derive(CleaningModule, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[module_meta(
    id = "intelligent_text_normalizer",
    name = "Intelligent Text Normalizer",
    category = "Plugins",
    description = "Normalize text with a language model following natural-language rules",
    plugin
)]
#[serde(default, deny_unknown_fields)]
pub struct IntelligentTextNormalizer {
    #[param(kind = "list", required, description = "Text columns to normalize")]
    #[serde(deserialize_with = "columns::list")]
    pub columns: Vec<String>,

    #[param(kind = "string", description = "Instructions given to the model")]
    pub normalization_rules: Option<String>,

    #[param(default = "50", min = 1.0)]
    pub max_new_tokens: usize,
}

impl Default for IntelligentTextNormalizer {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            normalization_rules: None,
            max_new_tokens: 50,
        }
    }
}

impl IntelligentTextNormalizer {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, rules: impl Into<String>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            normalization_rules: Some(rules.into()),
            ..Self::default()
        }
    }

    pub async fn apply(&self, df: &DataFrame, ctx: &ModuleContext) -> Result<DataFrame> {
        if self.columns.is_empty() {
            return Err(CleanError::invalid_params(MODULE_ID, "'columns' must be provided").into());
        }

        let rules = match self.normalization_rules.as_deref() {
            Some(rules) if !rules.is_empty() => rules,
            _ => {
                ctx.warn("No normalization_rules provided, skipping intelligent normalization");
                return Ok(df.clone());
            }
        };

        let Some(generator) = ctx.generator.as_ref() else {
            ctx.warn("No text generator configured, returning data unchanged");
            self.log_preview(df, rules);
            return Ok(df.clone());
        };

        log::info!(
            "User '{}' normalizing columns {:?} with model '{}'",
            ctx.username(),
            self.columns,
            generator.model_name()
        );

        if let Some(audit) = &ctx.audit {
            audit.log_event(
                AuditAction::PluginLlmNormalizerUsed,
                Outcome::Success,
                ctx.user_id(),
                Some(ctx.username()),
                serde_json::json!({
                    "columns_processed": self.columns,
                    "normalization_rules_applied": rules,
                    "model_name": generator.model_name(),
                }),
            );
        }

        let mut result = df.clone();
        for name in &self.columns {
            let Some(column) = result.column_mut(name) else {
                ctx.warn(format!("Column '{}' not found, skipping", name));
                continue;
            };

            let (mut processed, mut failed) = (0usize, 0usize);
            for (row, value) in column.values.iter_mut().enumerate() {
                if value.is_null() {
                    continue;
                }
                let text = value.to_string();
                if text.trim().is_empty() {
                    continue;
                }

                let prompt = format_prompt(&text, rules);
                let request = GenerationRequest::new(
                    prompt.clone(),
                    text.chars().count() + self.max_new_tokens,
                );
                match generator.generate(request).await {
                    Ok(output) => {
                        let normalized = parse_llm_output(&output, &prompt);
                        if normalized != text {
                            log::debug!("Row {} '{}': '{}' -> '{}'", row, name, text, normalized);
                        }
                        *value = Value::Text(normalized);
                        processed += 1;
                    }
                    Err(e) => {
                        log::error!("Generation failed for row {} column '{}': {:#}", row, name, e);
                        failed += 1;
                    }
                }
            }
            log::info!(
                "Finished column '{}': {} processed, {} failed",
                name,
                processed,
                failed
            );
        }

        Ok(result)
    }

    fn log_preview(&self, df: &DataFrame, rules: &str) {
        for name in &self.columns {
            let Some(column) = df.column(name) else {
                log::warn!("Column '{}' not found, skipping", name);
                continue;
            };
            log::info!("Would process column '{}' with rules '{}'", name, rules);
            for (row, value) in column.values.iter().take(PREVIEW_ROWS).enumerate() {
                log::info!("  row {}: would normalize '{}'", row, value);
            }
        }
    }
}

#[async_trait]
impl CleaningModule for IntelligentTextNormalizer {
    async fn on_create(&mut self, params: serde_json::Value) -> Result<()> {
        let parsed: Self = parse_params(MODULE_ID, params)?;
        if parsed.columns.is_empty() {
            return Err(CleanError::invalid_params(MODULE_ID, "'columns' must be provided").into());
        }
        *self = parsed;
        Ok(())
    }

    async fn process(&self, input: &DataFrame, ctx: &ModuleContext) -> Result<DataFrame> {
        self.apply(input, ctx).await
    }
}

/// Prompt asking the model for the normalized text only.
pub fn format_prompt(text: &str, rules: &str) -> String {
    format!(
        "Please normalize the following text based on these rules: '{rules}'.\n\
         Original text: '''{text}'''\n\
         Return only the normalized text, with no additional explanation, labels, or markdown formatting.\n\
         {OUTPUT_CUE}"
    )
}

/// Extract the normalized text from a completion that may echo the prompt.
pub fn parse_llm_output(output: &str, prompt: &str) -> String {
    if let Some((_, tail)) = output.rsplit_once(OUTPUT_CUE) {
        return tail.trim().to_string();
    }
    if let Some(rest) = output.strip_prefix(prompt) {
        return rest.trim().to_string();
    }
    log::warn!("Could not parse model output, using it as is: '{}'", output);
    output.trim().to_string()
}
