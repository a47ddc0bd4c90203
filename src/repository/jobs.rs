//! Job, requirement, benefit, and facet queries
//!
//! Includes the atomic facet claim: the caller wraps it in an immediate
//! transaction so two workers can never claim the same job.

use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use crate::errors::DatabaseError;
use crate::repository::models::{JobBenefit, JobFacetRow, JobPost, JobRequirementUnit};
use crate::repository::JobRepository;
use crate::vectors::{decode_embedding, encode_embedding};

const JOB_COLUMNS: &str = "id, canonical_fingerprint, title, company, location_text, is_remote, \
     description, skills_raw, raw_payload, content_hash, first_seen_at, last_seen_at, \
     is_extracted, is_embedded, summary_embedding, salary_min, salary_max, currency, \
     job_level, min_years_experience, requires_degree, facet_status, facet_claimed_by, \
     facet_claimed_at, facet_extraction_hash, facet_retry_count, facet_last_error";

fn job_from_row(row: &Row) -> rusqlite::Result<JobPost> {
    let raw_payload: Option<String> = row.get(8)?;
    let embedding_blob: Option<Vec<u8>> = row.get(14)?;
    Ok(JobPost {
        id: row.get(0)?,
        canonical_fingerprint: row.get(1)?,
        title: row.get(2)?,
        company: row.get(3)?,
        location_text: row.get(4)?,
        is_remote: row.get(5)?,
        description: row.get(6)?,
        skills_raw: row.get(7)?,
        raw_payload: raw_payload.and_then(|s| serde_json::from_str(&s).ok()),
        content_hash: row.get(9)?,
        first_seen_at: row.get(10)?,
        last_seen_at: row.get(11)?,
        is_extracted: row.get(12)?,
        is_embedded: row.get(13)?,
        summary_embedding: embedding_blob.map(|b| decode_embedding(&b)),
        salary_min: row.get(15)?,
        salary_max: row.get(16)?,
        currency: row.get(17)?,
        job_level: row.get(18)?,
        min_years_experience: row.get(19)?,
        requires_degree: row.get(20)?,
        facet_status: row.get(21)?,
        facet_claimed_by: row.get(22)?,
        facet_claimed_at: row.get(23)?,
        facet_extraction_hash: row.get(24)?,
        facet_retry_count: row.get(25)?,
        facet_last_error: row.get(26)?,
    })
}

impl<'a> JobRepository<'a> {
    pub fn get_job_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<JobPost>, DatabaseError> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM job_post WHERE canonical_fingerprint = ?",
            JOB_COLUMNS
        ))?;
        Ok(stmt.query_row([fingerprint], job_from_row).optional()?)
    }

    pub fn get_job_by_id(&self, job_id: i64) -> Result<JobPost, DatabaseError> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {} FROM job_post WHERE id = ?", JOB_COLUMNS))?;
        stmt.query_row([job_id], job_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    DatabaseError::NotFound(format!("job {}", job_id))
                }
                other => other.into(),
            })
    }

    pub fn create_job_post(
        &self,
        title: &str,
        company: &str,
        location_text: &str,
        is_remote: Option<bool>,
        fingerprint: &str,
    ) -> Result<i64, DatabaseError> {
        let now = self.now();
        self.conn().execute(
            "INSERT INTO job_post (canonical_fingerprint, title, company, location_text,
                                   is_remote, first_seen_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![fingerprint, title, company, location_text, is_remote, now],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    pub fn update_last_seen(&self, job_id: i64) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_post SET last_seen_at = ?1 WHERE id = ?2",
            params![self.now(), job_id],
        )?;
        Ok(())
    }

    pub fn get_or_create_source(
        &self,
        job_id: i64,
        site: &str,
        job_url: Option<&str>,
        job_url_direct: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "INSERT INTO job_post_source (job_post_id, site, job_url, job_url_direct)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (site, job_url) DO NOTHING",
            params![job_id, site, job_url, job_url_direct],
        )?;
        Ok(())
    }

    /// Update description/skills/payload and the content hash after a
    /// content change was detected by ingest.
    pub fn update_job_content(
        &self,
        job_id: i64,
        description: Option<&str>,
        skills_raw: Option<&str>,
        raw_payload: &Value,
        content_hash: &str,
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_post
             SET description = ?1, skills_raw = ?2, raw_payload = ?3, content_hash = ?4
             WHERE id = ?5",
            params![
                description,
                skills_raw,
                raw_payload.to_string(),
                content_hash,
                job_id
            ],
        )?;
        Ok(())
    }

    pub fn get_unextracted_jobs(&self, limit: usize) -> Result<Vec<JobPost>, DatabaseError> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM job_post
             WHERE is_extracted = 0 AND description IS NOT NULL
             ORDER BY id LIMIT ?",
            JOB_COLUMNS
        ))?;
        let rows = stmt.query_map([limit as i64], job_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn mark_as_extracted(&self, job_id: i64) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_post SET is_extracted = 1 WHERE id = ?",
            [job_id],
        )?;
        Ok(())
    }

    /// Job-level metadata from extraction. Salary bounds and currency are
    /// only filled when previously unset; scraped values win over extracted.
    #[allow(clippy::too_many_arguments)]
    pub fn update_job_metadata(
        &self,
        job_id: i64,
        job_level: Option<&str>,
        requires_degree: Option<bool>,
        min_years_experience: Option<f64>,
        salary_min: Option<f64>,
        salary_max: Option<f64>,
        currency: Option<&str>,
        is_remote: Option<bool>,
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_post SET
                job_level = ?1,
                requires_degree = ?2,
                min_years_experience = ?3,
                salary_min = COALESCE(salary_min, ?4),
                salary_max = COALESCE(salary_max, ?5),
                currency = COALESCE(currency, ?6),
                is_remote = COALESCE(?7, is_remote)
             WHERE id = ?8",
            params![
                job_level,
                requires_degree,
                min_years_experience,
                salary_min,
                salary_max,
                currency,
                is_remote,
                job_id
            ],
        )?;
        Ok(())
    }

    pub fn update_skills_raw(&self, job_id: i64, skills_raw: &str) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_post SET skills_raw = ?1 WHERE id = ?2",
            params![skills_raw, job_id],
        )?;
        Ok(())
    }

    pub fn update_raw_payload(&self, job_id: i64, payload: &Value) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_post SET raw_payload = ?1 WHERE id = ?2",
            params![payload.to_string(), job_id],
        )?;
        Ok(())
    }

    // ── Requirements & benefits ────────────────────────────────────────

    pub fn save_requirement(
        &self,
        job_id: i64,
        req_type: &str,
        text: &str,
        tags: &Value,
        ordinal: i64,
        min_years: Option<f64>,
        years_context: Option<&str>,
    ) -> Result<i64, DatabaseError> {
        self.conn().execute(
            "INSERT INTO job_requirement_unit
                (job_post_id, req_type, text, tags, ordinal, min_years, years_context)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                job_id,
                req_type,
                text,
                tags.to_string(),
                ordinal,
                min_years,
                years_context
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    pub fn save_benefit(
        &self,
        job_id: i64,
        category: &str,
        text: &str,
        ordinal: i64,
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "INSERT INTO job_benefit (job_post_id, category, text, ordinal)
             VALUES (?1, ?2, ?3, ?4)",
            params![job_id, category, text, ordinal],
        )?;
        Ok(())
    }

    pub fn get_requirements_for_job(
        &self,
        job_id: i64,
    ) -> Result<Vec<JobRequirementUnit>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT r.id, r.job_post_id, r.req_type, r.text, r.tags, r.ordinal,
                    r.min_years, r.years_context, e.embedding
             FROM job_requirement_unit r
             LEFT JOIN job_requirement_embedding e ON e.job_requirement_unit_id = r.id
             WHERE r.job_post_id = ?
             ORDER BY r.ordinal, r.id",
        )?;
        let rows = stmt.query_map([job_id], requirement_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_benefits_for_job(&self, job_id: i64) -> Result<Vec<JobBenefit>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, job_post_id, category, text, ordinal
             FROM job_benefit WHERE job_post_id = ? ORDER BY ordinal, id",
        )?;
        let rows = stmt.query_map([job_id], |row| {
            Ok(JobBenefit {
                id: row.get(0)?,
                job_post_id: row.get(1)?,
                category: row.get(2)?,
                text: row.get(3)?,
                ordinal: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_unembedded_requirements(
        &self,
        limit: usize,
    ) -> Result<Vec<JobRequirementUnit>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT r.id, r.job_post_id, r.req_type, r.text, r.tags, r.ordinal,
                    r.min_years, r.years_context, NULL
             FROM job_requirement_unit r
             LEFT JOIN job_requirement_embedding e ON e.job_requirement_unit_id = r.id
             WHERE e.id IS NULL
             ORDER BY r.id LIMIT ?",
        )?;
        let rows = stmt.query_map([limit as i64], requirement_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn save_requirement_embedding(
        &self,
        requirement_id: i64,
        embedding: &[f32],
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "INSERT INTO job_requirement_embedding (job_requirement_unit_id, embedding)
             VALUES (?1, ?2)
             ON CONFLICT (job_requirement_unit_id) DO UPDATE SET embedding = excluded.embedding",
            params![requirement_id, encode_embedding(embedding)],
        )?;
        Ok(())
    }

    // ── Embedding passes ───────────────────────────────────────────────

    pub fn get_unembedded_jobs(&self, limit: usize) -> Result<Vec<JobPost>, DatabaseError> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM job_post
             WHERE summary_embedding IS NULL AND description IS NOT NULL AND is_extracted = 1
             ORDER BY id LIMIT ?",
            JOB_COLUMNS
        ))?;
        let rows = stmt.query_map([limit as i64], job_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn save_job_embedding(&self, job_id: i64, embedding: &[f32]) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_post SET summary_embedding = ?1, is_embedded = 1 WHERE id = ?2",
            params![encode_embedding(embedding), job_id],
        )?;
        Ok(())
    }

    /// Top-K embedded jobs ranked by cosine similarity to the query vector.
    ///
    /// Candidates are loaded and ranked in process; the signature mirrors an
    /// index-backed query so the ranking backend can be swapped behind it.
    pub fn top_jobs_by_summary_embedding(
        &self,
        query: &[f32],
        limit: usize,
        require_remote: Option<bool>,
    ) -> Result<Vec<(JobPost, f64)>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM job_post
             WHERE is_embedded = 1 AND summary_embedding IS NOT NULL",
            JOB_COLUMNS
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], job_from_row)?;

        let mut scored: Vec<(JobPost, f64)> = Vec::new();
        for row in rows {
            let job = row?;
            if let Some(required) = require_remote {
                if job.is_remote != Some(required) {
                    continue;
                }
            }
            let similarity = match &job.summary_embedding {
                Some(embedding) => crate::vectors::cosine_similarity(query, embedding),
                None => continue,
            };
            scored.push((job, similarity.clamp(0.0, 1.0)));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    // ── Facets ─────────────────────────────────────────────────────────

    pub fn delete_facets_for_job(&self, job_id: i64) -> Result<(), DatabaseError> {
        self.conn()
            .execute("DELETE FROM job_facet_embedding WHERE job_post_id = ?", [job_id])?;
        Ok(())
    }

    /// Atomic upsert keyed on (job_post_id, facet_key); last writer wins.
    pub fn upsert_facet(
        &self,
        job_id: i64,
        facet_key: &str,
        facet_text: &str,
        embedding: Option<&[f32]>,
        content_hash: &str,
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "INSERT INTO job_facet_embedding
                (job_post_id, facet_key, facet_text, embedding, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (job_post_id, facet_key) DO UPDATE SET
                facet_text = excluded.facet_text,
                embedding = excluded.embedding,
                content_hash = excluded.content_hash",
            params![
                job_id,
                facet_key,
                facet_text,
                embedding.map(encode_embedding),
                content_hash
            ],
        )?;
        Ok(())
    }

    pub fn get_facets_for_job(&self, job_id: i64) -> Result<Vec<JobFacetRow>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, job_post_id, facet_key, facet_text, embedding, content_hash
             FROM job_facet_embedding WHERE job_post_id = ? ORDER BY facet_key",
        )?;
        let rows = stmt.query_map([job_id], |row| {
            let blob: Option<Vec<u8>> = row.get(4)?;
            Ok(JobFacetRow {
                id: row.get(0)?,
                job_post_id: row.get(1)?,
                facet_key: row.get(2)?,
                facet_text: row.get(3)?,
                embedding: blob.map(|b| decode_embedding(&b)),
                content_hash: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Facet embeddings for a job as a key -> vector map (for the scorer)
    pub fn get_facet_embeddings(
        &self,
        job_id: i64,
    ) -> Result<std::collections::HashMap<String, Vec<f32>>, DatabaseError> {
        let facets = self.get_facets_for_job(job_id)?;
        Ok(facets
            .into_iter()
            .filter_map(|f| f.embedding.map(|e| (f.facet_key, e)))
            .collect())
    }

    pub fn update_facet_embedding(
        &self,
        facet_id: i64,
        embedding: &[f32],
        content_hash: &str,
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_facet_embedding SET embedding = ?1, content_hash = ?2 WHERE id = ?3",
            params![encode_embedding(embedding), content_hash, facet_id],
        )?;
        Ok(())
    }

    /// Jobs whose facets are extracted but not yet embedded
    pub fn get_jobs_with_unembedded_facets(
        &self,
        limit: usize,
    ) -> Result<Vec<JobPost>, DatabaseError> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT DISTINCT {} FROM job_post j
             JOIN job_facet_embedding f ON f.job_post_id = j.id
             WHERE f.embedding IS NULL
             ORDER BY j.id LIMIT ?",
            JOB_COLUMNS
                .split(", ")
                .map(|c| format!("j.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        ))?;
        let rows = stmt.query_map([limit as i64], job_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ── Facet claim protocol ───────────────────────────────────────────

    /// Atomically claim up to `limit` jobs for facet extraction.
    ///
    /// Must run inside an immediate transaction. Resets stale claims older
    /// than `claim_timeout_minutes`, quarantines rows that exhausted
    /// `max_retries`, then claims pending embedded jobs whose facet hash is
    /// missing or stale, bumping their retry count.
    pub fn claim_jobs_for_facet_extraction(
        &self,
        limit: usize,
        worker_id: &str,
        claim_timeout_minutes: i64,
        max_retries: i64,
    ) -> Result<Vec<JobPost>, DatabaseError> {
        let now = chrono::Utc::now();
        let timeout_threshold =
            (now - chrono::Duration::minutes(claim_timeout_minutes)).to_rfc3339();

        // Reset stale in-progress claims (worker crash)
        self.conn().execute(
            "UPDATE job_post SET facet_status = 'pending'
             WHERE facet_status = 'in_progress' AND facet_claimed_at < ?1",
            params![timeout_threshold],
        )?;

        // Quarantine poison pills
        self.conn().execute(
            "UPDATE job_post SET facet_status = 'quarantined'
             WHERE facet_status = 'pending'
               AND facet_retry_count >= ?1
               AND description IS NOT NULL",
            params![max_retries],
        )?;

        let claimed_ids: Vec<i64> = {
            let mut stmt = self.conn().prepare(
                "SELECT id FROM job_post
                 WHERE is_embedded = 1
                   AND facet_status = 'pending'
                   AND description IS NOT NULL
                   AND (facet_extraction_hash IS NULL OR facet_extraction_hash != content_hash)
                   AND facet_retry_count < ?1
                 ORDER BY id LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![max_retries, limit as i64], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<i64>>>()?
        };

        if claimed_ids.is_empty() {
            return Ok(Vec::new());
        }

        let now_str = now.to_rfc3339();
        for id in &claimed_ids {
            self.conn().execute(
                "UPDATE job_post SET facet_status = 'in_progress',
                        facet_claimed_by = ?1,
                        facet_claimed_at = ?2,
                        facet_retry_count = facet_retry_count + 1
                 WHERE id = ?3",
                params![worker_id, now_str, id],
            )?;
        }

        claimed_ids
            .iter()
            .map(|id| self.get_job_by_id(*id))
            .collect()
    }

    pub fn mark_job_facets_extracted(
        &self,
        job_id: i64,
        content_hash: &str,
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_post SET facet_status = 'done',
                    facet_extraction_hash = ?1,
                    facet_claimed_by = NULL,
                    facet_claimed_at = NULL,
                    facet_last_error = NULL
             WHERE id = ?2",
            params![content_hash, job_id],
        )?;
        Ok(())
    }

    pub fn mark_job_facets_failed(
        &self,
        job_id: i64,
        error: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_post SET facet_status = 'pending',
                    facet_claimed_by = NULL,
                    facet_claimed_at = NULL,
                    facet_last_error = ?1
             WHERE id = ?2",
            params![error, job_id],
        )?;
        Ok(())
    }
}

fn requirement_from_row(row: &Row) -> rusqlite::Result<JobRequirementUnit> {
    let tags: Option<String> = row.get(4)?;
    let embedding_blob: Option<Vec<u8>> = row.get(8)?;
    Ok(JobRequirementUnit {
        id: row.get(0)?,
        job_post_id: row.get(1)?,
        req_type: row.get(2)?,
        text: row.get(3)?,
        tags: tags.and_then(|s| serde_json::from_str(&s).ok()),
        ordinal: row.get(5)?,
        min_years: row.get(6)?,
        years_context: row.get(7)?,
        embedding: embedding_blob.map(|b| decode_embedding(&b)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        conn
    }

    fn insert_job(repo: &JobRepository, fp: &str) -> i64 {
        repo.create_job_post("Engineer", "Acme", "Berlin", Some(true), fp)
            .unwrap()
    }

    #[test]
    fn create_and_fetch_by_fingerprint() {
        let conn = setup();
        let repo = JobRepository::new(&conn);
        let id = insert_job(&repo, "fp1");

        let job = repo.get_job_by_fingerprint("fp1").unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.title, "Engineer");
        assert_eq!(job.facet_status, "pending");
        assert!(repo.get_job_by_fingerprint("nope").unwrap().is_none());
    }

    #[test]
    fn source_upsert_is_unique_per_site_and_url() {
        let conn = setup();
        let repo = JobRepository::new(&conn);
        let id = insert_job(&repo, "fp1");

        repo.get_or_create_source(id, "indeed", Some("http://x/1"), None)
            .unwrap();
        repo.get_or_create_source(id, "indeed", Some("http://x/1"), None)
            .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM job_post_source", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn facet_upsert_is_idempotent() {
        let conn = setup();
        let repo = JobRepository::new(&conn);
        let id = insert_job(&repo, "fp1");

        let emb = vec![0.1f32, 0.2];
        repo.upsert_facet(id, "tech_stack", "Rust", Some(&emb), "h1")
            .unwrap();
        repo.upsert_facet(id, "tech_stack", "Rust", Some(&emb), "h1")
            .unwrap();

        let facets = repo.get_facets_for_job(id).unwrap();
        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].facet_text, "Rust");
        assert_eq!(facets[0].content_hash, "h1");

        // Last writer wins on conflicting text
        repo.upsert_facet(id, "tech_stack", "Rust, Tokio", None, "h2")
            .unwrap();
        let facets = repo.get_facets_for_job(id).unwrap();
        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].facet_text, "Rust, Tokio");
        assert!(facets[0].embedding.is_none());
    }

    #[test]
    fn top_jobs_ranks_by_similarity_and_filters_remote() {
        let conn = setup();
        let repo = JobRepository::new(&conn);

        let a = insert_job(&repo, "fp_a");
        repo.save_job_embedding(a, &[1.0, 0.0]).unwrap();
        let b = repo
            .create_job_post("Onsite", "Acme", "Berlin", Some(false), "fp_b")
            .unwrap();
        repo.save_job_embedding(b, &[0.9, 0.1]).unwrap();

        let ranked = repo
            .top_jobs_by_summary_embedding(&[1.0, 0.0], 10, None)
            .unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0.id, a);
        assert!(ranked[0].1 > ranked[1].1);

        let remote_only = repo
            .top_jobs_by_summary_embedding(&[1.0, 0.0], 10, Some(true))
            .unwrap();
        assert_eq!(remote_only.len(), 1);
        assert_eq!(remote_only[0].0.id, a);
    }

    #[test]
    fn claim_respects_status_and_hash() {
        let conn = setup();
        let repo = JobRepository::new(&conn);

        // Embedded + pending + content differs from facet hash -> claimable
        let a = insert_job(&repo, "fp_a");
        conn.execute(
            "UPDATE job_post SET is_embedded = 1, description = 'd', content_hash = 'c1' WHERE id = ?",
            [a],
        )
        .unwrap();

        // Facets already extracted for current content -> not claimable
        let b = insert_job(&repo, "fp_b");
        conn.execute(
            "UPDATE job_post SET is_embedded = 1, description = 'd', content_hash = 'c1',
                                 facet_extraction_hash = 'c1' WHERE id = ?",
            [b],
        )
        .unwrap();

        // Not embedded -> not claimable
        let c = insert_job(&repo, "fp_c");
        conn.execute(
            "UPDATE job_post SET description = 'd', content_hash = 'c1' WHERE id = ?",
            [c],
        )
        .unwrap();

        let claimed = repo
            .claim_jobs_for_facet_extraction(10, "worker-1", 30, 5)
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, a);
        assert_eq!(claimed[0].facet_status, "in_progress");
        assert_eq!(claimed[0].facet_claimed_by.as_deref(), Some("worker-1"));
        assert_eq!(claimed[0].facet_retry_count, 1);

        // Second claim finds nothing: the job is in_progress now
        let again = repo
            .claim_jobs_for_facet_extraction(10, "worker-2", 30, 5)
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn exhausted_retries_are_quarantined() {
        let conn = setup();
        let repo = JobRepository::new(&conn);
        let a = insert_job(&repo, "fp_a");
        conn.execute(
            "UPDATE job_post SET is_embedded = 1, description = 'd', content_hash = 'c1',
                                 facet_retry_count = 5 WHERE id = ?",
            [a],
        )
        .unwrap();

        let claimed = repo
            .claim_jobs_for_facet_extraction(10, "w", 30, 5)
            .unwrap();
        assert!(claimed.is_empty());

        let status: String = conn
            .query_row("SELECT facet_status FROM job_post WHERE id = ?", [a], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(status, "quarantined");
    }

    #[test]
    fn stale_claims_are_reset_and_reclaimed() {
        let conn = setup();
        let repo = JobRepository::new(&conn);
        let a = insert_job(&repo, "fp_a");
        let stale = (chrono::Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
        conn.execute(
            "UPDATE job_post SET is_embedded = 1, description = 'd', content_hash = 'c1',
                                 facet_status = 'in_progress', facet_claimed_by = 'dead',
                                 facet_claimed_at = ? WHERE id = ?",
            params![stale, a],
        )
        .unwrap();

        let claimed = repo
            .claim_jobs_for_facet_extraction(10, "alive", 30, 5)
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].facet_claimed_by.as_deref(), Some("alive"));
    }
}
