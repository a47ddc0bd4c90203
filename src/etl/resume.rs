//! Resume profiler: structured extraction, evidence units, embeddings
//!
//! A resume is re-extracted only when its canonical-JSON fingerprint is new;
//! section and evidence embeddings are replaced atomically so a half-written
//! resume never reaches the matcher.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use rusqlite::Connection;
use serde_json::{json, Value};

use crate::ai::client::ExtractionClient;
use crate::ai::types::{ExtractionOutcome, ResumeProfile, ResumeSchema};
use crate::errors::{DatabaseError, JobRadarError, ValidationError};
use crate::fingerprint::resume_fingerprint;
use crate::orchestrator::StopSignal;
use crate::repository::resume::{EvidenceEmbeddingPayload, SectionEmbeddingPayload};
use crate::repository::JobRepository;
use crate::vectors::normalize;

/// Atomic claim derived from one resume field, before embedding
#[derive(Debug, Clone)]
pub struct EvidenceUnit {
    pub id: String,
    pub text: String,
    pub source_section: String,
    pub tags: Value,
    pub years_value: Option<f64>,
    pub years_context: Option<String>,
    pub is_total_years_claim: bool,
}

/// Result of one profiler run
#[derive(Debug, Clone)]
pub struct ResumeOutcome {
    /// False when the fingerprint matched an already-processed resume
    pub changed: bool,
    pub fingerprint: String,
}

pub struct ResumeProfiler {
    client: ExtractionClient,
}

impl ResumeProfiler {
    pub fn new(client: ExtractionClient) -> Self {
        Self { client }
    }

    /// Process the configured resume file end to end.
    ///
    /// Checkpoints for cancellation: after extraction, after evidence
    /// derivation, and between embedding calls.
    pub async fn process_resume(
        &self,
        conn: &mut Connection,
        resume_file: &Path,
        stop: &StopSignal,
    ) -> Result<ResumeOutcome, JobRadarError> {
        let raw = std::fs::read_to_string(resume_file).map_err(|e| {
            JobRadarError::Validation(ValidationError::MissingField(format!(
                "resume file {}: {}",
                resume_file.display(),
                e
            )))
        })?;
        let resume_data: Value = serde_json::from_str(&raw).map_err(|e| {
            JobRadarError::Validation(ValidationError::InvalidFormat(format!(
                "resume file is not valid JSON: {}",
                e
            )))
        })?;

        let fingerprint = resume_fingerprint(&resume_data);
        log::info!("Resume fingerprint: {}...", &fingerprint[..16]);

        {
            let repo = JobRepository::new(conn);
            if repo
                .get_structured_resume_by_fingerprint(&fingerprint)?
                .is_some()
            {
                log::info!("Resume unchanged, skipping extraction");
                return Ok(ResumeOutcome {
                    changed: false,
                    fingerprint,
                });
            }
        }

        log::info!("Resume changed, processing...");

        let resume_text =
            serde_json::to_string_pretty(&resume_data).unwrap_or_else(|_| raw.clone());
        let resume = match self.client.extract_resume(&resume_text).await? {
            ExtractionOutcome::Valid(resume) => resume,
            ExtractionOutcome::InvalidSchema(raw_payload) => {
                log::error!(
                    "Resume extraction failed schema validation; raw payload: {}",
                    raw_payload
                );
                return Err(JobRadarError::Validation(ValidationError::InvalidFormat(
                    "resume extraction did not fit schema".to_string(),
                )));
            }
        };

        check_stop(stop)?;

        let total_years = claimed_total_years(&resume);
        log::info!(
            "Extracted resume with {} experience entries, claimed {} years",
            resume.profile.experience.len(),
            total_years.map_or("unknown".to_string(), |y| y.to_string())
        );

        let mut evidence = extract_resume_evidence(&resume.profile);
        log::info!("Extracted {} evidence units from resume", evidence.len());

        check_stop(stop)?;

        // Embed evidence units
        let mut evidence_payload = Vec::with_capacity(evidence.len());
        for unit in evidence.drain(..) {
            check_stop(stop)?;
            let mut embedding = self.client.embed(&unit.text).await?;
            normalize(&mut embedding);
            evidence_payload.push(EvidenceEmbeddingPayload {
                evidence_unit_id: unit.id,
                source_text: unit.text,
                source_section: unit.source_section,
                tags: Some(unit.tags),
                embedding,
                years_value: unit.years_value,
                years_context: unit.years_context,
                is_total_years_claim: unit.is_total_years_claim,
            });
        }

        // Embed coarse sections
        let mut section_payload = Vec::new();
        for (idx, exp) in resume.profile.experience.iter().enumerate() {
            if let Some(text) = exp.to_embedding_text() {
                check_stop(stop)?;
                let mut embedding = self.client.embed(&text).await?;
                normalize(&mut embedding);
                section_payload.push(SectionEmbeddingPayload {
                    section_type: "experience".to_string(),
                    section_index: idx as i64,
                    source_text: text,
                    source_data: serde_json::to_value(exp).ok(),
                    embedding,
                });
            }
        }
        if let Some(text) = resume.profile.skills.to_embedding_text() {
            check_stop(stop)?;
            let mut embedding = self.client.embed(&text).await?;
            normalize(&mut embedding);
            section_payload.push(SectionEmbeddingPayload {
                section_type: "skills".to_string(),
                section_index: 0,
                source_text: text,
                source_data: serde_json::to_value(&resume.profile.skills).ok(),
                embedding,
            });
        }
        if let Some(summary) = &resume.profile.summary {
            if let Some(text) = summary.text.clone().filter(|t| !t.is_empty()) {
                check_stop(stop)?;
                let mut embedding = self.client.embed(&text).await?;
                normalize(&mut embedding);
                section_payload.push(SectionEmbeddingPayload {
                    section_type: "summary".to_string(),
                    section_index: 0,
                    source_text: text,
                    source_data: serde_json::to_value(summary).ok(),
                    embedding,
                });
            }
        }

        // One transaction: structured resume + both embedding stores
        let extraction_meta = resume.extraction.clone().unwrap_or_default();
        let profile_value = serde_json::to_value(&resume).map_err(|e| {
            JobRadarError::Validation(ValidationError::General(e.to_string()))
        })?;

        let tx = conn.transaction().map_err(DatabaseError::from)?;
        {
            let repo = JobRepository::new(&tx);
            repo.save_structured_resume(
                &fingerprint,
                &profile_value,
                total_years,
                extraction_meta.confidence,
                &extraction_meta.warnings,
            )?;
            repo.replace_evidence_embeddings(&fingerprint, &evidence_payload)?;
            repo.replace_section_embeddings(&fingerprint, &section_payload)?;
        }
        tx.commit().map_err(DatabaseError::from)?;

        log::info!(
            "Saved structured resume, {} evidence units, {} sections",
            evidence_payload.len(),
            section_payload.len()
        );

        Ok(ResumeOutcome {
            changed: true,
            fingerprint,
        })
    }
}

fn check_stop(stop: &StopSignal) -> Result<(), JobRadarError> {
    if stop.is_set() {
        return Err(JobRadarError::Application(
            "Resume profiling interrupted".to_string(),
        ));
    }
    Ok(())
}

fn claimed_total_years(resume: &ResumeSchema) -> Option<f64> {
    resume.claimed_total_years.or_else(|| {
        resume
            .profile
            .summary
            .as_ref()
            .and_then(|s| s.total_experience_years)
    })
}

/// Derive evidence units from a structured profile: one per experience
/// description / highlight / tech keyword, per project field, per education
/// field, per skill.
pub fn extract_resume_evidence(profile: &ResumeProfile) -> Vec<EvidenceUnit> {
    fn push(
        text: String,
        source: &str,
        tags: Value,
        years: Option<f64>,
        context: Option<String>,
        units: &mut Vec<EvidenceUnit>,
    ) {
        let id = format!("reu_{}", units.len());
        let (years_value, years_context, is_total) = match years {
            Some(y) => (Some(y), context, false),
            None => extract_years_from_text(&text),
        };
        units.push(EvidenceUnit {
            id,
            text,
            source_section: source.to_string(),
            tags,
            years_value,
            years_context,
            is_total_years_claim: is_total,
        });
    }

    let mut units: Vec<EvidenceUnit> = Vec::new();

    for (idx, exp) in profile.experience.iter().enumerate() {
        let company = exp.company.clone().unwrap_or_default();
        let title = exp.title.clone().unwrap_or_default();

        if let Some(description) = exp.description.clone().filter(|d| !d.is_empty()) {
            let context = if company.is_empty() {
                "experience".to_string()
            } else {
                "experience_at_company".to_string()
            };
            push(
                description,
                "Experience",
                json!({"company": company, "title": title, "index": idx,
                       "type": "description", "is_current": exp.is_current}),
                exp.years_value,
                Some(context),
                &mut units,
            );
        }

        for highlight in exp.highlights.iter().filter(|h| !h.is_empty()) {
            push(
                highlight.clone(),
                "Experience",
                json!({"company": company, "title": title, "index": idx,
                       "type": "highlight", "is_current": exp.is_current}),
                None,
                None,
                &mut units,
            );
        }

        for tech in &exp.tech_keywords {
            let mentioned = exp
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(&tech.to_lowercase()))
                .unwrap_or(false);
            push(
                format!("Experience with {}", tech),
                "Experience",
                json!({"company": company, "title": title, "technology": tech,
                       "type": "tech_keyword"}),
                if mentioned { exp.years_value } else { None },
                if mentioned {
                    Some(format!("{}_experience", tech))
                } else {
                    None
                },
                &mut units,
            );
        }
    }

    for (idx, project) in profile.projects.iter().enumerate() {
        let name = project.name.clone().unwrap_or_default();
        if let Some(description) = project.description.clone().filter(|d| !d.is_empty()) {
            push(
                description,
                "Projects",
                json!({"project": name, "index": idx, "type": "description"}),
                None,
                None,
                &mut units,
            );
        }
        for highlight in project.highlights.iter().filter(|h| !h.is_empty()) {
            push(
                highlight.clone(),
                "Projects",
                json!({"project": name, "index": idx, "type": "highlight"}),
                None,
                None,
                &mut units,
            );
        }
    }

    for (idx, education) in profile.education.iter().enumerate() {
        let institution = education.institution.clone().unwrap_or_default();
        let degree = education.degree.clone().unwrap_or_default();
        if let Some(description) = education.description.clone().filter(|d| !d.is_empty()) {
            push(
                description,
                "Education",
                json!({"institution": institution, "degree": degree, "index": idx,
                       "type": "description"}),
                None,
                None,
                &mut units,
            );
        }
        for highlight in education.highlights.iter().filter(|h| !h.is_empty()) {
            push(
                highlight.clone(),
                "Education",
                json!({"institution": institution, "degree": degree, "index": idx,
                       "type": "highlight"}),
                None,
                None,
                &mut units,
            );
        }
    }

    for skill in profile.skills.all.iter().filter(|s| !s.name.is_empty()) {
        let text = skill.to_embedding_text();
        push(
            if text.trim().is_empty() {
                skill.name.clone()
            } else {
                text
            },
            "Skills",
            json!({"skill": skill.name, "kind": skill.kind, "proficiency": skill.proficiency,
                   "years_experience": skill.years_experience, "type": "skill"}),
            skill.years_experience,
            Some(format!("{}_skill", skill.name)),
            &mut units,
        );
    }

    units
}

fn total_claim_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?:total|overall|cumulative)?\s*experience\s*:?\s*(\d+(?:\.\d+)?)\s*(?:-|to)?\s*(?:\d+(?:\.\d+)?)?\s*years?",
        )
        .expect("valid total claim regex")
    })
}

fn general_years_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\+?\s*(?:years?|yrs?)(?:\s+(?:of|in|with))?\s*([a-zA-Z][a-zA-Z ]{0,30})?")
            .expect("valid years regex")
    })
}

/// Extract a years value from evidence text.
///
/// Total-experience claims ("total experience: 8 years") win over general
/// mentions ("4 years of Go").
pub fn extract_years_from_text(text: &str) -> (Option<f64>, Option<String>, bool) {
    let text_lower = text.to_lowercase();

    if let Some(captures) = total_claim_pattern().captures(&text_lower) {
        if let Some(years) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
            return (Some(years), Some("total_experience".to_string()), true);
        }
    }

    if let Some(captures) = general_years_pattern().captures(&text_lower) {
        if let Some(years) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
            let context = captures
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "general".to_string());
            return (Some(years), Some(context), false);
        }
    }

    (None, None, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockProvider;
    use crate::ai::types::{ExperienceEntry, SkillItem, Skills};
    use crate::db::init_database;
    use std::io::Write;
    use std::sync::Arc;

    #[test]
    fn total_claim_beats_general_mention() {
        let (years, context, total) =
            extract_years_from_text("Total experience: 8 years, including 3 years of Go");
        assert_eq!(years, Some(8.0));
        assert_eq!(context.as_deref(), Some("total_experience"));
        assert!(total);
    }

    #[test]
    fn general_mention_extracts_value_and_context() {
        let (years, context, total) = extract_years_from_text("4.5 years of backend work");
        assert_eq!(years, Some(4.5));
        assert_eq!(context.as_deref(), Some("backend work"));
        assert!(!total);

        assert_eq!(extract_years_from_text("Wrote firmware in C").0, None);
    }

    #[test]
    fn evidence_units_cover_all_sections() {
        let profile = ResumeProfile {
            experience: vec![ExperienceEntry {
                company: Some("Acme".to_string()),
                title: Some("Engineer".to_string()),
                description: Some("Built python services".to_string()),
                highlights: vec!["Cut costs 30%".to_string()],
                tech_keywords: vec!["python".to_string(), "kafka".to_string()],
                years_value: Some(4.0),
                ..Default::default()
            }],
            skills: Skills {
                all: vec![SkillItem {
                    name: "Rust".to_string(),
                    years_experience: Some(2.0),
                    ..Default::default()
                }],
            },
            ..Default::default()
        };

        let units = extract_resume_evidence(&profile);
        // description + highlight + 2 tech keywords + 1 skill
        assert_eq!(units.len(), 5);

        let description = &units[0];
        assert_eq!(description.source_section, "Experience");
        assert_eq!(description.years_value, Some(4.0));

        // "python" is mentioned in the description, "kafka" is not
        let python_unit = units
            .iter()
            .find(|u| u.text == "Experience with python")
            .unwrap();
        assert_eq!(python_unit.years_value, Some(4.0));
        let kafka_unit = units
            .iter()
            .find(|u| u.text == "Experience with kafka")
            .unwrap();
        assert_eq!(kafka_unit.years_value, None);

        let skill_unit = units.iter().find(|u| u.source_section == "Skills").unwrap();
        assert_eq!(skill_unit.years_value, Some(2.0));
        assert_eq!(skill_unit.years_context.as_deref(), Some("Rust_skill"));

        // Ids are unique and sequential
        let ids: std::collections::HashSet<_> = units.iter().map(|u| u.id.clone()).collect();
        assert_eq!(ids.len(), units.len());
    }

    fn mock_resume_response() -> Value {
        json!({
            "profile": {
                "summary": {"text": "Backend engineer", "total_experience_years": 6.0},
                "experience": [{
                    "company": "Acme",
                    "title": "Engineer",
                    "is_current": true,
                    "description": "5 years of Python and AWS",
                    "highlights": ["Led migration"],
                    "tech_keywords": ["Python"],
                    "years_value": 5.0
                }],
                "projects": [],
                "education": [],
                "skills": {"all": [{"name": "Python", "years_experience": 5.0}]}
            },
            "extraction": {"confidence": 0.9, "warnings": []}
        })
    }

    fn write_resume(dir: &tempfile::TempDir, body: &Value) -> std::path::PathBuf {
        let path = dir.path().join("resume.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.to_string().as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn profiling_persists_and_short_circuits_on_same_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let resume_file = write_resume(
            &dir,
            &json!({"profile": {"summary": "Backend engineer", "skills": ["python"]}}),
        );

        let mut conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();

        let mock = Arc::new(MockProvider::new());
        mock.register_structured("resume_extraction", mock_resume_response());
        let profiler = ResumeProfiler::new(ExtractionClient::new(mock.clone()));
        let stop = StopSignal::new();

        let first = profiler
            .process_resume(&mut conn, &resume_file, &stop)
            .await
            .unwrap();
        assert!(first.changed);

        {
            let repo = JobRepository::new(&conn);
            let stored = repo
                .get_structured_resume_by_fingerprint(&first.fingerprint)
                .unwrap()
                .unwrap();
            assert_eq!(stored.total_experience_years, Some(6.0));

            let evidence = repo.get_evidence_embeddings(&first.fingerprint).unwrap();
            assert!(!evidence.is_empty());
            let sections = repo
                .get_section_embeddings(&first.fingerprint, None)
                .unwrap();
            // experience + skills + summary
            assert_eq!(sections.len(), 3);
            assert_eq!(
                repo.max_experience_years(&first.fingerprint).unwrap(),
                Some(5.0)
            );
        }

        let calls_after_first = mock.embedding_call_count();
        let second = profiler
            .process_resume(&mut conn, &resume_file, &stop)
            .await
            .unwrap();
        assert!(!second.changed);
        assert_eq!(second.fingerprint, first.fingerprint);
        assert_eq!(mock.embedding_call_count(), calls_after_first);
    }
}
