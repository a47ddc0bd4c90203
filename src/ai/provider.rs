use serde_json::Value;

use crate::ai::errors::AiProviderError;

/// Main LLM provider trait
/// All structured extraction and embedding calls go through this abstraction
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Extract structured JSON data from text adhering to a schema.
    ///
    /// `schema_spec` is either a wrapped spec `{name, strict, schema}` or a
    /// raw JSON Schema object; implementations unwrap the envelope so the
    /// model always receives the actual schema.
    async fn extract_structured(
        &self,
        text: &str,
        schema_spec: &Value,
        system_prompt: Option<&str>,
        user_message: Option<&str>,
    ) -> Result<Value, AiProviderError>;

    /// Generate a vector embedding for the given text
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, AiProviderError>;
}
