//! Typed extraction client
//!
//! Wraps any `LlmProvider` with the domain extraction calls. Schema-level
//! validation happens here: the caller receives a tagged
//! `ExtractionOutcome` (`Valid` or `InvalidSchema` with the raw payload)
//! instead of guessing at dict shapes.

use std::sync::Arc;

use serde_json::Value;

use crate::ai::errors::AiProviderError;
use crate::ai::prompts::{
    FACET_EXTRACTION_SYSTEM_PROMPT, REQUIREMENTS_EXTRACTION_SYSTEM_PROMPT,
    RESUME_EXTRACTION_SYSTEM_PROMPT,
};
use crate::ai::provider::LlmProvider;
use crate::ai::schemas::{facet_schema, requirements_schema, resume_schema};
use crate::ai::types::{ExtractionOutcome, FacetExtraction, JobExtraction, ResumeSchema};

#[derive(Clone)]
pub struct ExtractionClient {
    provider: Arc<dyn LlmProvider>,
}

impl ExtractionClient {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> Arc<dyn LlmProvider> {
        Arc::clone(&self.provider)
    }

    /// Extract qualification requirements from a job description
    pub async fn extract_requirements(
        &self,
        description: &str,
    ) -> Result<ExtractionOutcome<JobExtraction>, AiProviderError> {
        let user_message = format!(
            "<JOB_DESCRIPTION>\n{}\n</JOB_DESCRIPTION>\n\nExtract all qualification requirements.",
            description
        );
        let raw = self
            .provider
            .extract_structured(
                description,
                &requirements_schema(),
                Some(REQUIREMENTS_EXTRACTION_SYSTEM_PROMPT),
                Some(&user_message),
            )
            .await?;

        Ok(validate_into(raw))
    }

    /// Extract the seven facet texts from a job description
    pub async fn extract_facets(
        &self,
        description: &str,
    ) -> Result<ExtractionOutcome<FacetExtraction>, AiProviderError> {
        let user_message = format!(
            "<JOB_DESCRIPTION>\n{}\n</JOB_DESCRIPTION>\n\nExtract all 7 facets from this job description.",
            description
        );
        let raw = self
            .provider
            .extract_structured(
                description,
                &facet_schema(),
                Some(FACET_EXTRACTION_SYSTEM_PROMPT),
                Some(&user_message),
            )
            .await?;

        Ok(validate_into(raw))
    }

    /// Extract a structured resume from resume text or JSON
    pub async fn extract_resume(
        &self,
        resume_text: &str,
    ) -> Result<ExtractionOutcome<ResumeSchema>, AiProviderError> {
        let user_message = format!(
            "Extract the structured resume data following the schema.\n\nResume:\n{}",
            resume_text
        );
        let raw = self
            .provider
            .extract_structured(
                resume_text,
                &resume_schema(),
                Some(RESUME_EXTRACTION_SYSTEM_PROMPT),
                Some(&user_message),
            )
            .await?;

        Ok(validate_into(raw))
    }

    /// Generate an embedding for the given text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AiProviderError> {
        self.provider.generate_embedding(text).await
    }
}

fn validate_into<T: serde::de::DeserializeOwned>(raw: Value) -> ExtractionOutcome<T> {
    match serde_json::from_value::<T>(raw.clone()) {
        Ok(parsed) => ExtractionOutcome::Valid(parsed),
        Err(e) => {
            log::warn!("Extraction payload failed schema validation: {}", e);
            ExtractionOutcome::InvalidSchema(raw)
        }
    }
}
