use anyhow::Result;
use async_trait::async_trait;

/// Sampling settings for a single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_new_tokens: usize) -> Self {
        Self {
            prompt: prompt.into(),
            max_new_tokens,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// A text-generation backend supplied by the host application.
///
/// Implementations return the full generated text, which may echo the prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Name recorded in audit entries
    fn model_name(&self) -> &str;

    async fn generate(&self, request: GenerationRequest) -> Result<String>;
}
