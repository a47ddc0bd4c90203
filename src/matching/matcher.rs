//! Stage 1: vector retrieval
//!
//! Top-K job retrieval by summary-embedding similarity, then per-requirement
//! best-evidence matching against the resume's evidence units. The matcher
//! never mutates embeddings; it borrows them for the duration of a call.

use rusqlite::Connection;

use crate::ai::client::ExtractionClient;
use crate::config::MatcherConfig;
use crate::errors::JobRadarError;
use crate::orchestrator::StopSignal;
use crate::repository::{JobPost, JobRepository, JobRequirementUnit, ResumeEvidenceRow};
use crate::vectors::{cosine_similarity, normalize};

/// Retrieval depth when `batch_size` is unset
const DEFAULT_TOP_K: usize = 100;
/// How many evidence texts feed the composite resume embedding
const COMPOSITE_EVIDENCE_LIMIT: usize = 5;

/// Result of matching a single requirement against the evidence pool
#[derive(Debug, Clone)]
pub struct RequirementMatchResult {
    pub requirement: JobRequirementUnit,
    /// Best evidence text/section, present only when covered
    pub evidence_text: Option<String>,
    pub evidence_section: Option<String>,
    pub similarity: f64,
    pub is_covered: bool,
}

/// Preliminary match before scoring (output of stage 1)
#[derive(Debug, Clone)]
pub struct JobMatchPreliminary {
    pub job: JobPost,
    pub job_similarity: f64,
    pub requirement_matches: Vec<RequirementMatchResult>,
    pub missing_requirements: Vec<RequirementMatchResult>,
    pub resume_fingerprint: String,
}

pub struct MatcherService {
    client: ExtractionClient,
    config: MatcherConfig,
}

impl MatcherService {
    pub fn new(client: ExtractionClient, config: MatcherConfig) -> Self {
        Self { client, config }
    }

    /// Two-stage retrieval for one resume: top-K jobs by cosine similarity,
    /// then per-requirement cover checks.
    ///
    /// `require_remote` is the hard retrieval filter; the stop signal is
    /// observed between jobs.
    pub async fn match_resume_two_stage(
        &self,
        conn: &mut Connection,
        resume_fingerprint: &str,
        require_remote: Option<bool>,
        stop: &StopSignal,
    ) -> Result<Vec<JobMatchPreliminary>, JobRadarError> {
        let evidence = {
            let repo = JobRepository::new(conn);
            repo.get_evidence_embeddings(resume_fingerprint)?
        };
        if evidence.is_empty() {
            log::warn!(
                "No evidence embeddings for resume {}...",
                &resume_fingerprint[..16.min(resume_fingerprint.len())]
            );
            return Ok(Vec::new());
        }

        // Composite resume embedding for job-level similarity
        let composite_text = evidence
            .iter()
            .take(COMPOSITE_EVIDENCE_LIMIT)
            .map(|e| e.source_text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let mut resume_embedding = self.client.embed(&composite_text).await?;
        normalize(&mut resume_embedding);

        let top_k = self.config.batch_size.unwrap_or(DEFAULT_TOP_K);
        let candidates = {
            let repo = JobRepository::new(conn);
            repo.top_jobs_by_summary_embedding(&resume_embedding, top_k, require_remote)?
        };
        log::info!("Retrieved {} candidate jobs for matching", candidates.len());

        let mut preliminaries = Vec::with_capacity(candidates.len());
        for (job, job_similarity) in candidates {
            if stop.is_set() {
                log::info!("Matcher interrupted; returning partial results");
                break;
            }

            let requirements = {
                let repo = JobRepository::new(conn);
                repo.get_requirements_for_job(job.id)?
            };

            let mut matched = Vec::new();
            let mut missing = Vec::new();
            for requirement in requirements {
                let result = self
                    .match_requirement(&requirement, &evidence)
                    .await?;
                if result.is_covered {
                    matched.push(result);
                } else {
                    missing.push(result);
                }
            }

            preliminaries.push(JobMatchPreliminary {
                job,
                job_similarity,
                requirement_matches: matched,
                missing_requirements: missing,
                resume_fingerprint: resume_fingerprint.to_string(),
            });
        }

        Ok(preliminaries)
    }

    /// Find the best evidence unit for one requirement by cosine similarity;
    /// covered iff the best similarity clears the threshold.
    async fn match_requirement(
        &self,
        requirement: &JobRequirementUnit,
        evidence: &[ResumeEvidenceRow],
    ) -> Result<RequirementMatchResult, JobRadarError> {
        let requirement_embedding = match &requirement.embedding {
            Some(existing) => existing.clone(),
            None => {
                // Embedding row missing (fresh requirement): embed on the fly
                let mut vector = self.client.embed(&requirement.text).await?;
                normalize(&mut vector);
                vector
            }
        };

        let mut best_similarity = 0.0f64;
        let mut best_evidence: Option<&ResumeEvidenceRow> = None;
        for unit in evidence {
            let similarity = cosine_similarity(&requirement_embedding, &unit.embedding);
            if similarity > best_similarity {
                best_similarity = similarity;
                best_evidence = Some(unit);
            }
        }

        let is_covered = best_similarity >= self.config.similarity_threshold;

        Ok(RequirementMatchResult {
            requirement: requirement.clone(),
            evidence_text: best_evidence
                .filter(|_| is_covered)
                .map(|e| e.source_text.clone()),
            evidence_section: best_evidence
                .filter(|_| is_covered)
                .map(|e| e.source_section.clone()),
            similarity: best_similarity,
            is_covered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockProvider;
    use crate::db::init_database;
    use crate::repository::resume::EvidenceEmbeddingPayload;
    use serde_json::json;
    use std::sync::Arc;

    fn service(threshold: f64) -> MatcherService {
        MatcherService::new(
            ExtractionClient::new(Arc::new(MockProvider::new())),
            MatcherConfig {
                similarity_threshold: threshold,
                batch_size: None,
            },
        )
    }

    fn seed_evidence(conn: &Connection, fp: &str, texts: &[&str]) {
        let repo = JobRepository::new(conn);
        let units: Vec<EvidenceEmbeddingPayload> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| EvidenceEmbeddingPayload {
                evidence_unit_id: format!("reu_{}", i),
                source_text: text.to_string(),
                source_section: "Experience".to_string(),
                tags: None,
                embedding: MockProvider::mock_embedding(text),
                years_value: None,
                years_context: None,
                is_total_years_claim: false,
            })
            .collect();
        repo.replace_evidence_embeddings(fp, &units).unwrap();
    }

    fn seed_job(conn: &Connection, fp: &str, summary: &str, requirements: &[&str]) -> i64 {
        let repo = JobRepository::new(conn);
        let id = repo
            .create_job_post("Engineer", "Acme", "Berlin", Some(true), fp)
            .unwrap();
        conn.execute(
            "UPDATE job_post SET description = 'd', is_extracted = 1 WHERE id = ?",
            [id],
        )
        .unwrap();
        repo.save_job_embedding(id, &MockProvider::mock_embedding(summary))
            .unwrap();
        for (i, text) in requirements.iter().enumerate() {
            let req_id = repo
                .save_requirement(id, "required", text, &json!({}), i as i64, None, None)
                .unwrap();
            repo.save_requirement_embedding(req_id, &MockProvider::mock_embedding(text))
                .unwrap();
        }
        id
    }

    #[tokio::test]
    async fn covered_and_missing_requirements_split_on_threshold() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        seed_evidence(&conn, "fp_resume", &["python services", "postgres schemas"]);
        seed_job(
            &conn,
            "fp_job",
            "python backend",
            &["python experience", "kafka streaming"],
        );

        let results = service(0.5)
            .match_resume_two_stage(&mut conn, "fp_resume", None, &StopSignal::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let preliminary = &results[0];
        assert_eq!(preliminary.requirement_matches.len(), 1);
        assert_eq!(preliminary.missing_requirements.len(), 1);

        let covered = &preliminary.requirement_matches[0];
        assert!(covered.is_covered);
        assert_eq!(covered.evidence_text.as_deref(), Some("python services"));
        assert!(covered.similarity >= 0.5);

        let missing = &preliminary.missing_requirements[0];
        assert!(!missing.is_covered);
        assert!(missing.evidence_text.is_none());
    }

    #[tokio::test]
    async fn remote_filter_applies_at_retrieval() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        seed_evidence(&conn, "fp_resume", &["python services"]);
        seed_job(&conn, "fp_remote", "python backend", &["python"]);
        let onsite = {
            let repo = JobRepository::new(&conn);
            let id = repo
                .create_job_post("Onsite", "Globex", "Munich", Some(false), "fp_onsite")
                .unwrap();
            repo.save_job_embedding(id, &MockProvider::mock_embedding("python backend"))
                .unwrap();
            id
        };

        let results = service(0.5)
            .match_resume_two_stage(&mut conn, "fp_resume", Some(true), &StopSignal::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_ne!(results[0].job.id, onsite);
    }

    #[tokio::test]
    async fn no_evidence_yields_no_matches() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        seed_job(&conn, "fp_job", "python backend", &["python"]);

        let results = service(0.5)
            .match_resume_two_stage(&mut conn, "fp_empty", None, &StopSignal::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
