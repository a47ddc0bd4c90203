//! OpenAI-compatible LLM provider
//!
//! Speaks `/chat/completions` with the `json_schema` response format for
//! structured extraction, and `/embeddings` for vectors. A separate embedding
//! endpoint/key can be configured; otherwise the extraction client is reused.

use std::collections::HashMap;

use reqwest::Client;
use serde_json::{json, Value};

use crate::ai::errors::AiProviderError;
use crate::ai::provider::LlmProvider;
use crate::ai::schemas::unwrap_schema_spec;
use crate::config::LlmConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

struct Endpoint {
    base_url: String,
    api_key: Option<String>,
    headers: HashMap<String, String>,
}

pub struct OpenAiProvider {
    client: Client,
    extraction: Endpoint,
    embedding: Endpoint,
    extraction_model: String,
    embedding_model: String,
    embedding_dimensions: usize,
    extraction_temperature: f32,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let extraction = Endpoint {
            base_url: base_url.clone(),
            api_key: config.api_key.clone(),
            headers: config.extraction_headers.clone().unwrap_or_default(),
        };

        // Embeddings fall back to the extraction endpoint when not overridden
        let embedding = Endpoint {
            base_url: config.embedding_base_url.clone().unwrap_or(base_url),
            api_key: config
                .embedding_api_key
                .clone()
                .or_else(|| config.api_key.clone()),
            headers: config.embedding_headers.clone().unwrap_or_default(),
        };

        Self {
            client: Client::new(),
            extraction,
            embedding,
            extraction_model: config.extraction_model.clone(),
            embedding_model: config.embedding_model.clone(),
            embedding_dimensions: config.embedding_dimensions,
            extraction_temperature: config.extraction_temperature,
        }
    }

    fn request(&self, endpoint: &Endpoint, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", endpoint.base_url.trim_end_matches('/'), path);
        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(key) = &endpoint.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        for (name, value) in &endpoint.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    async fn check_status(response: reqwest::Response) -> Result<Value, AiProviderError> {
        if response.status() == 401 {
            return Err(AiProviderError::InvalidApiKey);
        }
        if response.status() == 429 {
            return Err(AiProviderError::RateLimitExceeded);
        }
        if response.status() == 404 {
            return Err(AiProviderError::ModelNotFound);
        }
        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AiProviderError::NetworkError(format!(
                "API error: {}",
                error_text
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AiProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn extract_structured(
        &self,
        text: &str,
        schema_spec: &Value,
        system_prompt: Option<&str>,
        user_message: Option<&str>,
    ) -> Result<Value, AiProviderError> {
        let (name, strict, raw_schema) = unwrap_schema_spec(schema_spec);

        if raw_schema.get("type") != Some(&Value::String("object".to_string()))
            || raw_schema.get("properties").is_none()
        {
            return Err(AiProviderError::ValidationError(
                "schema_spec is not a valid JSON Schema object".to_string(),
            ));
        }

        let system = system_prompt
            .unwrap_or("You are a helpful assistant that extracts structured data from job descriptions.");
        let user = match user_message {
            Some(msg) => msg.to_string(),
            None => format!(
                "Extract the data into the requested JSON format.\n\nDescription:\n{}",
                text
            ),
        };

        let body = json!({
            "model": self.extraction_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": self.extraction_temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": name,
                    "schema": raw_schema,
                    "strict": strict
                }
            }
        });

        let response = self
            .request(&self.extraction, "chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| AiProviderError::NetworkError(e.to_string()))?;

        let json_response = Self::check_status(response).await?;

        let content = json_response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                AiProviderError::InvalidResponse("Missing content in response".to_string())
            })?;

        serde_json::from_str(content)
            .map_err(|e| AiProviderError::InvalidResponse(format!("Failed to parse JSON: {}", e)))
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, AiProviderError> {
        let body = json!({
            "input": text,
            "model": self.embedding_model,
            "dimensions": self.embedding_dimensions
        });

        let response = self
            .request(&self.embedding, "embeddings")
            .json(&body)
            .send()
            .await
            .map_err(|e| AiProviderError::NetworkError(e.to_string()))?;

        let json_response = Self::check_status(response).await?;

        let embedding = json_response
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("embedding"))
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                AiProviderError::InvalidResponse("Missing embedding in response".to_string())
            })?;

        let vector: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        if vector.is_empty() {
            return Err(AiProviderError::InvalidResponse(
                "Empty embedding returned".to_string(),
            ));
        }

        Ok(vector)
    }
}
