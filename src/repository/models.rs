//! Row types shared across the repository modules

use serde_json::Value;

/// A job posting as stored in `job_post`
#[derive(Debug, Clone)]
pub struct JobPost {
    pub id: i64,
    pub canonical_fingerprint: String,
    pub title: String,
    pub company: String,
    pub location_text: String,
    pub is_remote: Option<bool>,
    pub description: Option<String>,
    pub skills_raw: Option<String>,
    pub raw_payload: Option<Value>,
    pub content_hash: Option<String>,
    pub first_seen_at: String,
    pub last_seen_at: String,
    pub is_extracted: bool,
    pub is_embedded: bool,
    pub summary_embedding: Option<Vec<f32>>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub currency: Option<String>,
    pub job_level: Option<String>,
    pub min_years_experience: Option<f64>,
    pub requires_degree: Option<bool>,
    pub facet_status: String,
    pub facet_claimed_by: Option<String>,
    pub facet_claimed_at: Option<String>,
    pub facet_extraction_hash: Option<String>,
    pub facet_retry_count: i64,
    pub facet_last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobRequirementUnit {
    pub id: i64,
    pub job_post_id: i64,
    /// required | preferred | responsibility | benefit
    pub req_type: String,
    pub text: String,
    pub tags: Option<Value>,
    pub ordinal: i64,
    pub min_years: Option<f64>,
    pub years_context: Option<String>,
    /// Paired embedding row, when already generated
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct JobBenefit {
    pub id: i64,
    pub job_post_id: i64,
    pub category: String,
    pub text: String,
    pub ordinal: i64,
}

#[derive(Debug, Clone)]
pub struct JobFacetRow {
    pub id: i64,
    pub job_post_id: i64,
    pub facet_key: String,
    pub facet_text: String,
    pub embedding: Option<Vec<f32>>,
    pub content_hash: String,
}

#[derive(Debug, Clone)]
pub struct StructuredResumeRow {
    pub id: i64,
    pub resume_fingerprint: String,
    pub profile: Value,
    pub total_experience_years: Option<f64>,
    pub extraction_confidence: Option<f64>,
    pub extraction_warnings: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ResumeSectionRow {
    pub id: i64,
    pub resume_fingerprint: String,
    pub section_type: String,
    pub section_index: i64,
    pub source_text: String,
    pub source_data: Option<Value>,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ResumeEvidenceRow {
    pub id: i64,
    pub resume_fingerprint: String,
    pub evidence_unit_id: String,
    pub source_text: String,
    pub source_section: String,
    pub tags: Option<Value>,
    pub embedding: Vec<f32>,
    pub years_value: Option<f64>,
    pub years_context: Option<String>,
    pub is_total_years_claim: bool,
}

#[derive(Debug, Clone)]
pub struct JobMatchRow {
    pub id: i64,
    pub job_post_id: i64,
    pub resume_fingerprint: String,
    pub job_content_hash: Option<String>,
    /// active | stale
    pub status: String,
    pub overall_score: f64,
    pub fit_score: f64,
    pub want_score: f64,
    pub base_score: f64,
    pub penalties: f64,
    pub penalty_details: Option<Value>,
    pub required_coverage: f64,
    pub preferred_coverage: f64,
    pub job_similarity: f64,
    pub match_type: String,
    pub notified: bool,
    pub calculated_at: String,
    pub invalidated_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobMatchRequirementRow {
    pub id: i64,
    pub job_match_id: i64,
    pub job_requirement_unit_id: i64,
    pub evidence_text: String,
    pub evidence_section: Option<String>,
    pub similarity_score: f64,
    pub is_covered: bool,
    pub req_type: String,
}

#[derive(Debug, Clone)]
pub struct NotificationTrackerRow {
    pub id: i64,
    pub user_id: String,
    pub job_match_id: Option<i64>,
    pub event_type: String,
    pub channel_type: String,
    pub dedup_hash: String,
    pub content_hash: Option<String>,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub last_sent_at: String,
    pub send_count: i64,
    pub allow_resend: bool,
    pub resend_interval_hours: i64,
    pub sent_successfully: bool,
    pub error_message: Option<String>,
}
