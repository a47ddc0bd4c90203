//! Embedding passes: job summaries, requirement units, and facet texts
//!
//! All vectors are normalized to unit length before storage so cosine math
//! downstream can rely on it.

use rusqlite::Connection;

use crate::ai::client::ExtractionClient;
use crate::errors::JobRadarError;
use crate::repository::{JobPost, JobRepository, JobRequirementUnit};
use crate::vectors::normalize;

/// How many requirement / benefit texts feed the summary embedding
const SUMMARY_REQUIREMENT_LIMIT: usize = 20;
const SUMMARY_BENEFIT_LIMIT: usize = 10;
/// Description fallback length when a job has no extracted units
const SUMMARY_DESCRIPTION_FALLBACK_CHARS: usize = 5000;

pub struct Embedder {
    client: ExtractionClient,
}

impl Embedder {
    pub fn new(client: ExtractionClient) -> Self {
        Self { client }
    }

    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, JobRadarError> {
        let mut vector = self.client.embed(text).await?;
        normalize(&mut vector);
        Ok(vector)
    }

    /// Generate and store the summary embedding for a single job; flips
    /// `is_embedded` on success.
    pub async fn embed_job_one(
        &self,
        conn: &mut Connection,
        job: &JobPost,
    ) -> Result<(), JobRadarError> {
        let text = {
            let repo = JobRepository::new(conn);
            build_summary_text(&repo, job)?
        };

        let vector = self.embed_text(&text).await?;

        let repo = JobRepository::new(conn);
        repo.save_job_embedding(job.id, &vector)?;
        Ok(())
    }

    /// Embed one requirement unit verbatim
    pub async fn embed_requirement_one(
        &self,
        conn: &mut Connection,
        requirement: &JobRequirementUnit,
    ) -> Result<(), JobRadarError> {
        let vector = self.embed_text(&requirement.text).await?;
        let repo = JobRepository::new(conn);
        repo.save_requirement_embedding(requirement.id, &vector)?;
        Ok(())
    }

    /// Embed any facet rows of a job that still lack a vector.
    ///
    /// Runs as a second pass after facet text extraction; facets are small
    /// and batch better separately.
    pub async fn embed_facets_one(
        &self,
        conn: &mut Connection,
        job: &JobPost,
    ) -> Result<usize, JobRadarError> {
        let pending: Vec<(i64, String)> = {
            let repo = JobRepository::new(conn);
            repo.get_facets_for_job(job.id)?
                .into_iter()
                .filter(|f| f.embedding.is_none())
                .map(|f| (f.id, f.facet_text))
                .collect()
        };

        if pending.is_empty() {
            log::debug!("No unembedded facets for job {}", job.id);
            return Ok(0);
        }

        let content_hash = job.content_hash.clone().unwrap_or_default();
        let mut embedded = 0;
        for (facet_id, facet_text) in pending {
            let vector = self.embed_text(&facet_text).await?;
            let repo = JobRepository::new(conn);
            repo.update_facet_embedding(facet_id, &vector, &content_hash)?;
            embedded += 1;
        }

        log::info!("Embedded {} facets for job {}", embedded, job.id);
        Ok(embedded)
    }
}

/// Concatenate requirement and benefit texts for the job summary embedding,
/// falling back to the description head when nothing was extracted.
fn build_summary_text(repo: &JobRepository, job: &JobPost) -> Result<String, JobRadarError> {
    let mut parts: Vec<String> = Vec::new();

    for req in repo
        .get_requirements_for_job(job.id)?
        .into_iter()
        .take(SUMMARY_REQUIREMENT_LIMIT)
    {
        parts.push(req.text);
    }
    for benefit in repo
        .get_benefits_for_job(job.id)?
        .into_iter()
        .take(SUMMARY_BENEFIT_LIMIT)
    {
        parts.push(benefit.text);
    }

    if parts.is_empty() {
        log::warn!(
            "Job {} has no requirements/benefits, using description for summary embedding",
            job.id
        );
        let description = job.description.clone().unwrap_or_default();
        return Ok(description
            .chars()
            .take(SUMMARY_DESCRIPTION_FALLBACK_CHARS)
            .collect());
    }

    Ok(parts.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockProvider;
    use crate::db::init_database;
    use serde_json::json;
    use std::sync::Arc;

    fn setup(conn: &Connection) -> i64 {
        init_database(conn).unwrap();
        let repo = JobRepository::new(conn);
        repo.create_job_post("Engineer", "Acme", "Berlin", None, "fp1")
            .unwrap()
    }

    fn embedder() -> Embedder {
        Embedder::new(ExtractionClient::new(Arc::new(MockProvider::new())))
    }

    #[tokio::test]
    async fn job_embedding_sets_flag_and_unit_length() {
        let mut conn = Connection::open_in_memory().unwrap();
        let job_id = setup(&conn);
        {
            let repo = JobRepository::new(&conn);
            conn.execute(
                "UPDATE job_post SET description = 'python backend role', is_extracted = 1 WHERE id = ?",
                [job_id],
            )
            .unwrap();
            repo.save_requirement(job_id, "required", "Python", &json!({}), 0, None, None)
                .unwrap();
        }
        let job = JobRepository::new(&conn).get_job_by_id(job_id).unwrap();

        embedder().embed_job_one(&mut conn, &job).await.unwrap();

        let refreshed = JobRepository::new(&conn).get_job_by_id(job_id).unwrap();
        assert!(refreshed.is_embedded);
        let embedding = refreshed.summary_embedding.unwrap();
        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn requirement_embedding_pairs_with_unit() {
        let mut conn = Connection::open_in_memory().unwrap();
        let job_id = setup(&conn);
        let req_id = {
            let repo = JobRepository::new(&conn);
            repo.save_requirement(job_id, "required", "5 years AWS", &json!({}), 0, None, None)
                .unwrap()
        };
        let req = JobRepository::new(&conn)
            .get_requirements_for_job(job_id)
            .unwrap()
            .remove(0);
        assert_eq!(req.id, req_id);

        embedder()
            .embed_requirement_one(&mut conn, &req)
            .await
            .unwrap();

        let unembedded = JobRepository::new(&conn)
            .get_unembedded_requirements(10)
            .unwrap();
        assert!(unembedded.is_empty());
    }

    #[tokio::test]
    async fn facet_pass_only_touches_missing_vectors() {
        let mut conn = Connection::open_in_memory().unwrap();
        let job_id = setup(&conn);
        {
            let repo = JobRepository::new(&conn);
            repo.upsert_facet(job_id, "tech_stack", "Rust and Tokio", None, "h")
                .unwrap();
            repo.upsert_facet(job_id, "compensation", "90-120k", Some(&[1.0, 0.0]), "h")
                .unwrap();
        }
        let job = JobRepository::new(&conn).get_job_by_id(job_id).unwrap();

        let embedded = embedder().embed_facets_one(&mut conn, &job).await.unwrap();
        assert_eq!(embedded, 1);

        let facets = JobRepository::new(&conn).get_facets_for_job(job_id).unwrap();
        assert!(facets.iter().all(|f| f.embedding.is_some()));
    }
}
