//! Mock LLM provider for testing
//!
//! Structured responses are registered per schema name; embeddings are
//! deterministic keyword-group vectors so related texts score high cosine
//! similarity and unrelated texts score near zero.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::ai::errors::AiProviderError;
use crate::ai::provider::LlmProvider;
use crate::ai::schemas::unwrap_schema_spec;

const KEYWORD_GROUPS: &[(&str, &[&str])] = &[
    ("java", &["java", "spring", "jvm", "enterprise"]),
    ("python", &["python", "django", "flask", "pandas"]),
    ("aws", &["aws", "amazon", "cloud", "ec2", "lambda", "s3"]),
    ("kubernetes", &["kubernetes", "k8s", "docker", "container"]),
    ("database", &["database", "sql", "postgresql", "postgres", "mysql"]),
    ("messaging", &["kafka", "sqs", "messaging", "queue", "stream"]),
    ("frontend", &["react", "frontend", "javascript", "typescript"]),
    ("remote", &["remote", "wfh", "work from home", "distributed"]),
    ("ai", &["ai", "llm", "machine learning", "model", "inference"]),
];

const MOCK_DIMENSIONS: usize = 32;

/// Mock AI provider for testing
/// Returns registered responses keyed by schema name, with sensible defaults
pub struct MockProvider {
    structured_responses: Arc<Mutex<HashMap<String, Value>>>,
    embedding_calls: Arc<Mutex<u64>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            structured_responses: Arc::new(Mutex::new(HashMap::new())),
            embedding_calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Register a structured response for a schema name
    /// (e.g. "job_requirements_extraction", "job_facet_extraction")
    pub fn register_structured(&self, schema_name: &str, response: Value) {
        self.structured_responses
            .lock()
            .unwrap()
            .insert(schema_name.to_string(), response);
    }

    /// Number of embedding calls made so far
    pub fn embedding_call_count(&self) -> u64 {
        *self.embedding_calls.lock().unwrap()
    }

    /// Deterministic keyword-group embedding for a text.
    ///
    /// Group dimensions carry the signal (1.0 when the text mentions the
    /// group); the remaining dimensions carry small hash noise so distinct
    /// texts never collapse to the zero vector.
    pub fn mock_embedding(text: &str) -> Vec<f32> {
        let text_lower = text.to_lowercase();

        let mut vector = vec![0.0f32; MOCK_DIMENSIONS];
        for (i, (_, keywords)) in KEYWORD_GROUPS.iter().enumerate() {
            if keywords.iter().any(|kw| text_lower.contains(kw)) {
                vector[i] = 1.0;
            }
        }

        let digest = Sha256::digest(text_lower.as_bytes());
        for (i, slot) in vector
            .iter_mut()
            .enumerate()
            .skip(KEYWORD_GROUPS.len())
        {
            let byte = digest[i % digest.len()];
            *slot = (byte as f32 / 255.0) * 0.05;
        }

        vector
    }

    fn default_response(schema_name: &str, text: &str) -> Value {
        match schema_name {
            "job_requirements_extraction" => {
                let excerpt: String = text.chars().take(100).collect();
                json!({
                    "requirements": [
                        {"req_type": "must_have", "text": excerpt, "related_skills": []}
                    ],
                    "benefits": []
                })
            }
            "job_facet_extraction" => json!({
                "remote_flexibility": "",
                "compensation": "",
                "learning_growth": "",
                "company_culture": "",
                "work_life_balance": "",
                "tech_stack": "",
                "visa_sponsorship": ""
            }),
            "resume_extraction" => json!({
                "profile": {
                    "summary": {"text": text.chars().take(80).collect::<String>()},
                    "experience": [],
                    "projects": [],
                    "education": [],
                    "skills": {"all": []}
                }
            }),
            _ => json!({}),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn extract_structured(
        &self,
        text: &str,
        schema_spec: &Value,
        _system_prompt: Option<&str>,
        _user_message: Option<&str>,
    ) -> Result<Value, AiProviderError> {
        let (name, _, _) = unwrap_schema_spec(schema_spec);
        let registered = self.structured_responses.lock().unwrap().get(&name).cloned();
        Ok(registered.unwrap_or_else(|| Self::default_response(&name, text)))
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, AiProviderError> {
        *self.embedding_calls.lock().unwrap() += 1;
        Ok(Self::mock_embedding(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::cosine_similarity;

    #[test]
    fn related_texts_score_high_similarity() {
        let a = MockProvider::mock_embedding("5 years of Python experience");
        let b = MockProvider::mock_embedding("python developer with django");
        assert!(cosine_similarity(&a, &b) > 0.9);
    }

    #[test]
    fn unrelated_texts_score_low_similarity() {
        let a = MockProvider::mock_embedding("Python experience");
        let b = MockProvider::mock_embedding("AWS cloud infrastructure");
        assert!(cosine_similarity(&a, &b) < 0.3);
    }

    #[test]
    fn embeddings_are_deterministic() {
        assert_eq!(
            MockProvider::mock_embedding("kafka streaming"),
            MockProvider::mock_embedding("kafka streaming")
        );
    }

    #[tokio::test]
    async fn registered_response_wins_over_default() {
        let mock = MockProvider::new();
        mock.register_structured("job_facet_extraction", serde_json::json!({"tech_stack": "Rust"}));
        let out = mock
            .extract_structured("text", &crate::ai::schemas::facet_schema(), None, None)
            .await
            .unwrap();
        assert_eq!(out["tech_stack"], "Rust");
    }
}
