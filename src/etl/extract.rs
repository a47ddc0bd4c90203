//! Requirement extraction: LLM call, schema validation, years parsing,
//! transactional persistence
//!
//! The LLM call happens outside the transaction (model calls are slow and
//! must not hold the writer lock); persistence of the validated result is a
//! single short transaction per job.

use regex::Regex;
use rusqlite::Connection;
use serde_json::json;
use std::sync::OnceLock;

use crate::ai::client::ExtractionClient;
use crate::ai::types::{map_req_type, ExtractionOutcome, JobExtraction};
use crate::errors::{JobRadarError, ValidationError};
use crate::repository::{JobPost, JobRepository};

/// Result of one extraction attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractStatus {
    /// Requirements persisted, job marked extracted
    Extracted { requirement_count: usize },
    /// Model output failed schema validation; job left unextracted for the
    /// next cycle
    InvalidSchema,
}

pub struct RequirementExtractor {
    client: ExtractionClient,
}

impl RequirementExtractor {
    pub fn new(client: ExtractionClient) -> Self {
        Self { client }
    }

    /// Extract structured data from a single job description.
    pub async fn extract_one(
        &self,
        conn: &mut Connection,
        job: &JobPost,
    ) -> Result<ExtractStatus, JobRadarError> {
        log::info!("Extracting for job {}: {}", job.id, job.title);

        let description = job.description.as_deref().ok_or_else(|| {
            JobRadarError::Validation(ValidationError::MissingField(format!(
                "job {} has no description",
                job.id
            )))
        })?;

        let extraction = match self.client.extract_requirements(description).await? {
            ExtractionOutcome::Valid(extraction) => extraction,
            ExtractionOutcome::InvalidSchema(raw) => {
                log::error!(
                    "Extraction for job {} failed schema validation; raw payload: {}",
                    job.id,
                    raw
                );
                return Ok(ExtractStatus::InvalidSchema);
            }
        };

        if extraction.requirements.is_empty() {
            return Err(JobRadarError::Validation(ValidationError::General(format!(
                "Empty requirements extraction for job {}",
                job.id
            ))));
        }

        let requirement_count = extraction.requirements.len();

        let tx = conn.transaction().map_err(crate::errors::DatabaseError::from)?;
        {
            let repo = JobRepository::new(&tx);
            persist_extraction(&repo, job, &extraction)?;
        }
        tx.commit().map_err(crate::errors::DatabaseError::from)?;

        Ok(ExtractStatus::Extracted { requirement_count })
    }
}

fn persist_extraction(
    repo: &JobRepository,
    job: &JobPost,
    extraction: &JobExtraction,
) -> Result<(), JobRadarError> {
    // Remote policy from the description wins only when explicit
    let is_remote = match extraction.remote_policy.as_deref() {
        Some("Remote (Local)") | Some("Remote (Global)") => Some(true),
        Some("On-site") => Some(false),
        _ => None,
    };

    repo.update_job_metadata(
        job.id,
        extraction.seniority_level.as_deref(),
        extraction.requires_degree,
        extraction.min_years_experience,
        extraction.salary_min,
        extraction.salary_max,
        extraction.currency.as_deref(),
        is_remote,
    )?;

    if !extraction.tech_stack.is_empty() {
        repo.update_skills_raw(job.id, &extraction.tech_stack.join(","))?;
    }

    // Fold AI summary fields into the raw payload for later inspection
    if extraction.job_summary.is_some() || extraction.visa_sponsorship_available.is_some() {
        let mut payload = job.raw_payload.clone().unwrap_or_else(|| json!({}));
        if let Some(summary) = &extraction.job_summary {
            payload["ai_job_summary"] = json!(summary);
        }
        if let Some(visa) = extraction.visa_sponsorship_available {
            payload["visa_sponsorship_available"] = json!(visa);
        }
        repo.update_raw_payload(job.id, &payload)?;
    }

    for (i, req) in extraction.requirements.iter().enumerate() {
        let (min_years, years_context) = extract_years_from_requirement(&req.text);
        let tags = json!({
            "skills": req.related_skills,
            "category": req.category,
            "proficiency": req.proficiency,
        });
        let ordinal = if req.ordinal != 0 { req.ordinal } else { i as i64 };
        repo.save_requirement(
            job.id,
            map_req_type(&req.req_type),
            &req.text,
            &tags,
            ordinal,
            min_years,
            years_context.as_deref(),
        )?;
    }

    for (i, benefit) in extraction.benefits.iter().enumerate() {
        let ordinal = if benefit.ordinal != 0 {
            benefit.ordinal
        } else {
            i as i64
        };
        repo.save_benefit(job.id, &benefit.category, &benefit.text, ordinal)?;
    }

    repo.mark_as_extracted(job.id)?;
    Ok(())
}

fn years_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(
                r"(?:at least |minimum )?(\d+)\+?\s*(?:years?|yrs?)\s+(?:of\s+)?(?:experience\s+(?:in|with|using)\s+)?([^,.;]+)",
            )
            .expect("valid years regex"),
            Regex::new(r"(?:at least |minimum )?(\d+)\+?\s*(?:years?|yrs?)")
                .expect("valid years regex"),
        ]
    })
}

/// Derive (min_years, years_context) from a requirement text.
///
/// Pattern: `(\d+)\+?\s*(years?|yrs?)` with an optional trailing context
/// phrase. Context is whitespace-collapsed and stripped of leading
/// of/in/with/using/experience.
pub fn extract_years_from_requirement(text: &str) -> (Option<f64>, Option<String>) {
    if text.is_empty() {
        return (None, None);
    }
    let text_lower = text.to_lowercase();

    for pattern in years_patterns() {
        if let Some(captures) = pattern.captures(&text_lower) {
            let years = captures
                .get(1)
                .and_then(|m| m.as_str().parse::<f64>().ok());
            let context = captures.get(2).map(|m| {
                let collapsed = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
                let stripped = collapsed
                    .strip_prefix("of ")
                    .or_else(|| collapsed.strip_prefix("in "))
                    .or_else(|| collapsed.strip_prefix("with "))
                    .or_else(|| collapsed.strip_prefix("using "))
                    .or_else(|| collapsed.strip_prefix("experience "))
                    .unwrap_or(&collapsed);
                stripped.trim().to_string()
            });
            if years.is_some() {
                return (years, context.filter(|c| !c.is_empty()));
            }
        }
    }

    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockProvider;
    use crate::db::init_database;
    use crate::etl::ingest::ingest_one;
    use std::sync::Arc;

    fn setup_job(conn: &Connection) -> JobPost {
        init_database(conn).unwrap();
        let repo = JobRepository::new(conn);
        ingest_one(
            &repo,
            &json!({
                "title": "Backend Engineer",
                "company_name": "Acme",
                "location": "Berlin",
                "description": "We need 5+ years of Python and AWS."
            }),
            "indeed",
        )
        .unwrap();
        repo.get_unextracted_jobs(1).unwrap().remove(0)
    }

    #[test]
    fn years_regex_parses_common_phrasings() {
        let (years, context) = extract_years_from_requirement("5+ years of Python experience");
        assert_eq!(years, Some(5.0));
        assert_eq!(context.as_deref(), Some("python experience"));

        let (years, _) = extract_years_from_requirement("at least 3 yrs with Kubernetes");
        assert_eq!(years, Some(3.0));

        let (years, context) = extract_years_from_requirement("7 years");
        assert_eq!(years, Some(7.0));
        assert!(context.is_none());

        assert_eq!(extract_years_from_requirement("Strong Python skills").0, None);
        assert_eq!(extract_years_from_requirement("").0, None);
    }

    #[tokio::test]
    async fn valid_extraction_persists_and_marks_job() {
        let mut conn = Connection::open_in_memory().unwrap();
        let job = setup_job(&conn);

        let mock = MockProvider::new();
        mock.register_structured(
            "job_requirements_extraction",
            json!({
                "seniority_level": "Senior",
                "remote_policy": "Remote (Global)",
                "salary_min": 90000.0,
                "salary_max": 120000.0,
                "currency": "EUR",
                "tech_stack": ["Python", "AWS"],
                "requirements": [
                    {"req_type": "must_have", "text": "5+ years of Python", "related_skills": ["python"]},
                    {"req_type": "nice_to_have", "text": "Kubernetes exposure"}
                ],
                "benefits": [
                    {"category": "pto", "text": "30 days PTO"}
                ]
            }),
        );
        let extractor = RequirementExtractor::new(ExtractionClient::new(Arc::new(mock)));

        let status = extractor.extract_one(&mut conn, &job).await.unwrap();
        assert_eq!(status, ExtractStatus::Extracted { requirement_count: 2 });

        let repo = JobRepository::new(&conn);
        let updated = repo.get_job_by_id(job.id).unwrap();
        assert!(updated.is_extracted);
        assert_eq!(updated.job_level.as_deref(), Some("Senior"));
        assert_eq!(updated.is_remote, Some(true));
        assert_eq!(updated.salary_max, Some(120000.0));

        let requirements = repo.get_requirements_for_job(job.id).unwrap();
        assert_eq!(requirements.len(), 2);
        assert_eq!(requirements[0].req_type, "required");
        assert_eq!(requirements[0].min_years, Some(5.0));
        assert_eq!(requirements[1].req_type, "preferred");
        assert_eq!(requirements[1].min_years, None);

        assert_eq!(repo.get_benefits_for_job(job.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_schema_leaves_job_unextracted() {
        let mut conn = Connection::open_in_memory().unwrap();
        let job = setup_job(&conn);

        let mock = MockProvider::new();
        mock.register_structured("job_requirements_extraction", json!({"requirements": 7}));
        let extractor = RequirementExtractor::new(ExtractionClient::new(Arc::new(mock)));

        let status = extractor.extract_one(&mut conn, &job).await.unwrap();
        assert_eq!(status, ExtractStatus::InvalidSchema);

        let repo = JobRepository::new(&conn);
        assert!(!repo.get_job_by_id(job.id).unwrap().is_extracted);
        assert!(repo.get_requirements_for_job(job.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_requirements_is_an_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        let job = setup_job(&conn);

        let mock = MockProvider::new();
        mock.register_structured(
            "job_requirements_extraction",
            json!({"requirements": [], "benefits": []}),
        );
        let extractor = RequirementExtractor::new(ExtractionClient::new(Arc::new(mock)));

        assert!(extractor.extract_one(&mut conn, &job).await.is_err());
        let repo = JobRepository::new(&conn);
        assert!(!repo.get_job_by_id(job.id).unwrap().is_extracted);
    }
}
