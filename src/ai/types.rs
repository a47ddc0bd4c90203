//! Typed shapes for LLM extraction results
//!
//! These structs mirror the JSON schemas in `schemas.rs`. Deserialization is
//! lenient about missing optional fields so near-conformant model output
//! still validates; structurally broken output is surfaced as
//! `ExtractionOutcome::InvalidSchema` with the raw value attached.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a structured extraction call.
///
/// The caller branches explicitly instead of catching exceptions: transport
/// failures are `Err` at the call site, schema mismatches are
/// `InvalidSchema` carrying the raw payload for logging.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome<T> {
    Valid(T),
    InvalidSchema(Value),
}

/// One qualification unit extracted from a job description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRequirement {
    /// must_have | nice_to_have | responsibility | benefit
    #[serde(default = "default_req_type")]
    pub req_type: String,
    /// Verbatim excerpt from the description
    pub text: String,
    #[serde(default)]
    pub related_skills: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub proficiency: Option<String>,
    #[serde(default)]
    pub ordinal: i64,
}

fn default_req_type() -> String {
    "must_have".to_string()
}

/// Map the model's requirement labels onto stored `req_type` values
pub fn map_req_type(raw: &str) -> &'static str {
    match raw {
        "must_have" => "required",
        "nice_to_have" => "preferred",
        "responsibility" => "responsibility",
        "benefit" => "benefit",
        _ => "required",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBenefit {
    #[serde(default = "default_benefit_category")]
    pub category: String,
    pub text: String,
    #[serde(default)]
    pub ordinal: i64,
}

fn default_benefit_category() -> String {
    "other".to_string()
}

/// Full requirements-extraction result for one job description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExtraction {
    #[serde(default)]
    pub thought_process: Option<String>,
    #[serde(default)]
    pub job_summary: Option<String>,
    #[serde(default)]
    pub seniority_level: Option<String>,
    #[serde(default)]
    pub requires_degree: Option<bool>,
    #[serde(default)]
    pub min_years_experience: Option<f64>,
    #[serde(default)]
    pub salary_min: Option<f64>,
    #[serde(default)]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// "Remote (Local)" | "Remote (Global)" | "Hybrid" | "On-site" | "Unspecified"
    #[serde(default)]
    pub remote_policy: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub visa_sponsorship_available: Option<bool>,
    #[serde(default)]
    pub requirements: Vec<RawRequirement>,
    #[serde(default)]
    pub benefits: Vec<RawBenefit>,
}

/// The seven semantic facet keys, in stable order
pub const FACET_KEYS: [&str; 7] = [
    "remote_flexibility",
    "compensation",
    "learning_growth",
    "company_culture",
    "work_life_balance",
    "tech_stack",
    "visa_sponsorship",
];

/// Per-facet text extracted from a job description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacetExtraction {
    #[serde(default)]
    pub remote_flexibility: String,
    #[serde(default)]
    pub compensation: String,
    #[serde(default)]
    pub learning_growth: String,
    #[serde(default)]
    pub company_culture: String,
    #[serde(default)]
    pub work_life_balance: String,
    #[serde(default)]
    pub tech_stack: String,
    #[serde(default)]
    pub visa_sponsorship: String,
}

impl FacetExtraction {
    /// Facet text by key; unknown keys yield the empty string
    pub fn text_for(&self, key: &str) -> &str {
        match key {
            "remote_flexibility" => &self.remote_flexibility,
            "compensation" => &self.compensation,
            "learning_growth" => &self.learning_growth,
            "company_culture" => &self.company_culture,
            "work_life_balance" => &self.work_life_balance,
            "tech_stack" => &self.tech_stack,
            "visa_sponsorship" => &self.visa_sponsorship,
            _ => "",
        }
    }
}

// ── Structured resume shapes ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeSummary {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub total_experience_years: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub tech_keywords: Vec<String>,
    /// Only when the resume explicitly states years for this role
    #[serde(default)]
    pub years_value: Option<f64>,
}

impl ExperienceEntry {
    /// Text used for the coarse per-experience section embedding
    pub fn to_embedding_text(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let (Some(title), Some(company)) = (&self.title, &self.company) {
            parts.push(format!("{} at {}", title, company));
        } else if let Some(title) = &self.title {
            parts.push(title.clone());
        } else if let Some(company) = &self.company {
            parts.push(company.clone());
        }
        if let Some(desc) = &self.description {
            if !desc.is_empty() {
                parts.push(desc.clone());
            }
        }
        for h in &self.highlights {
            if !h.is_empty() {
                parts.push(h.clone());
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field_of_study: Option<String>,
    #[serde(default)]
    pub graduation_year: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillItem {
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub proficiency: Option<String>,
    #[serde(default)]
    pub years_experience: Option<f64>,
}

impl SkillItem {
    pub fn to_embedding_text(&self) -> String {
        let mut text = self.name.clone();
        if let Some(kind) = &self.kind {
            if !kind.is_empty() {
                text.push_str(&format!(" ({})", kind));
            }
        }
        if let Some(years) = self.years_experience {
            text.push_str(&format!(", {} years", years));
        }
        text
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skills {
    #[serde(default)]
    pub all: Vec<SkillItem>,
}

impl Skills {
    /// Text used for the single skills-block section embedding
    pub fn to_embedding_text(&self) -> Option<String> {
        if self.all.is_empty() {
            return None;
        }
        Some(
            self.all
                .iter()
                .map(|s| s.to_embedding_text())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeProfile {
    #[serde(default)]
    pub summary: Option<ResumeSummary>,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub skills: Skills,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionMeta {
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Full structured-resume extraction result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeSchema {
    pub profile: ResumeProfile,
    #[serde(default)]
    pub claimed_total_years: Option<f64>,
    #[serde(default)]
    pub extraction: Option<ExtractionMeta>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn req_type_mapping_covers_all_labels() {
        assert_eq!(map_req_type("must_have"), "required");
        assert_eq!(map_req_type("nice_to_have"), "preferred");
        assert_eq!(map_req_type("responsibility"), "responsibility");
        assert_eq!(map_req_type("benefit"), "benefit");
        assert_eq!(map_req_type("garbage"), "required");
    }

    #[test]
    fn job_extraction_tolerates_missing_optionals() {
        let value = json!({
            "requirements": [{"text": "5+ years of Python", "req_type": "must_have"}]
        });
        let parsed: JobExtraction = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.requirements.len(), 1);
        assert!(parsed.benefits.is_empty());
        assert!(parsed.seniority_level.is_none());
    }

    #[test]
    fn facet_text_lookup_matches_keys() {
        let facets = FacetExtraction {
            tech_stack: "Rust, Postgres".to_string(),
            ..Default::default()
        };
        assert_eq!(facets.text_for("tech_stack"), "Rust, Postgres");
        assert_eq!(facets.text_for("compensation"), "");
        assert_eq!(facets.text_for("nope"), "");
    }

    #[test]
    fn experience_embedding_text_joins_parts() {
        let exp = ExperienceEntry {
            company: Some("Acme".to_string()),
            title: Some("Engineer".to_string()),
            description: Some("Built pipelines".to_string()),
            highlights: vec!["Cut latency 40%".to_string()],
            ..Default::default()
        };
        let text = exp.to_embedding_text().unwrap();
        assert!(text.contains("Engineer at Acme"));
        assert!(text.contains("Cut latency 40%"));

        assert!(ExperienceEntry::default().to_embedding_text().is_none());
    }
}
