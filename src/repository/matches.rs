//! Match record queries: upsert with stale-history semantics, child
//! replacement, and bulk invalidation

use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use crate::errors::DatabaseError;
use crate::repository::models::{JobMatchRequirementRow, JobMatchRow};
use crate::repository::JobRepository;

/// Score fields written when inserting or updating a match row
#[derive(Debug, Clone)]
pub struct MatchScores {
    pub overall_score: f64,
    pub fit_score: f64,
    pub want_score: f64,
    pub base_score: f64,
    pub penalties: f64,
    pub penalty_details: Value,
    pub required_coverage: f64,
    pub preferred_coverage: f64,
    pub job_similarity: f64,
    pub match_type: String,
}

/// One requirement child row written alongside a match
#[derive(Debug, Clone)]
pub struct MatchRequirementPayload {
    pub requirement_id: i64,
    pub evidence_text: String,
    pub evidence_section: Option<String>,
    pub similarity_score: f64,
    pub is_covered: bool,
    pub req_type: String,
}

impl<'a> JobRepository<'a> {
    /// The active match for a (job, resume) pair, if any
    pub fn get_active_match(
        &self,
        job_id: i64,
        resume_fingerprint: &str,
    ) -> Result<Option<JobMatchRow>, DatabaseError> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM job_match
             WHERE job_post_id = ?1 AND resume_fingerprint = ?2 AND status = 'active'
             ORDER BY id DESC LIMIT 1",
            MATCH_COLUMNS
        ))?;
        Ok(stmt
            .query_row(params![job_id, resume_fingerprint], match_from_row)
            .optional()?)
    }

    pub fn get_match_by_id(&self, match_id: i64) -> Result<Option<JobMatchRow>, DatabaseError> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM job_match WHERE id = ?",
            MATCH_COLUMNS
        ))?;
        Ok(stmt.query_row([match_id], match_from_row).optional()?)
    }

    pub fn insert_match(
        &self,
        job_id: i64,
        resume_fingerprint: &str,
        job_content_hash: Option<&str>,
        scores: &MatchScores,
    ) -> Result<i64, DatabaseError> {
        self.conn().execute(
            "INSERT INTO job_match
                (job_post_id, resume_fingerprint, job_content_hash, status,
                 overall_score, fit_score, want_score, base_score, penalties,
                 penalty_details, required_coverage, preferred_coverage,
                 job_similarity, match_type, notified, calculated_at)
             VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0, ?14)",
            params![
                job_id,
                resume_fingerprint,
                job_content_hash,
                scores.overall_score,
                scores.fit_score,
                scores.want_score,
                scores.base_score,
                scores.penalties,
                scores.penalty_details.to_string(),
                scores.required_coverage,
                scores.preferred_coverage,
                scores.job_similarity,
                scores.match_type,
                self.now()
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// In-place score update; preserves the notified flag.
    pub fn update_match_scores(
        &self,
        match_id: i64,
        job_content_hash: Option<&str>,
        scores: &MatchScores,
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_match SET
                status = 'active',
                job_content_hash = ?1,
                overall_score = ?2,
                fit_score = ?3,
                want_score = ?4,
                base_score = ?5,
                penalties = ?6,
                penalty_details = ?7,
                required_coverage = ?8,
                preferred_coverage = ?9,
                job_similarity = ?10,
                match_type = ?11,
                calculated_at = ?12
             WHERE id = ?13",
            params![
                job_content_hash,
                scores.overall_score,
                scores.fit_score,
                scores.want_score,
                scores.base_score,
                scores.penalties,
                scores.penalty_details.to_string(),
                scores.required_coverage,
                scores.preferred_coverage,
                scores.job_similarity,
                scores.match_type,
                self.now(),
                match_id
            ],
        )?;
        Ok(())
    }

    pub fn mark_match_stale(&self, match_id: i64, reason: &str) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE job_match SET status = 'stale', invalidated_reason = ?1 WHERE id = ?2",
            params![reason, match_id],
        )?;
        Ok(())
    }

    pub fn set_match_notified(&self, match_id: i64) -> Result<(), DatabaseError> {
        self.conn()
            .execute("UPDATE job_match SET notified = 1 WHERE id = ?", [match_id])?;
        Ok(())
    }

    /// Replace all requirement children of a match (delete-then-insert)
    pub fn replace_match_requirements(
        &self,
        match_id: i64,
        children: &[MatchRequirementPayload],
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "DELETE FROM job_match_requirement WHERE job_match_id = ?",
            [match_id],
        )?;
        for child in children {
            self.conn().execute(
                "INSERT INTO job_match_requirement
                    (job_match_id, job_requirement_unit_id, evidence_text,
                     evidence_section, similarity_score, is_covered, req_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    match_id,
                    child.requirement_id,
                    child.evidence_text,
                    child.evidence_section,
                    child.similarity_score,
                    child.is_covered,
                    child.req_type
                ],
            )?;
        }
        Ok(())
    }

    pub fn get_match_requirements(
        &self,
        match_id: i64,
    ) -> Result<Vec<JobMatchRequirementRow>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, job_match_id, job_requirement_unit_id, evidence_text,
                    evidence_section, similarity_score, is_covered, req_type
             FROM job_match_requirement WHERE job_match_id = ? ORDER BY id",
        )?;
        let rows = stmt.query_map([match_id], |row| {
            Ok(JobMatchRequirementRow {
                id: row.get(0)?,
                job_match_id: row.get(1)?,
                job_requirement_unit_id: row.get(2)?,
                evidence_text: row.get(3)?,
                evidence_section: row.get(4)?,
                similarity_score: row.get(5)?,
                is_covered: row.get(6)?,
                req_type: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Flip all active matches for a job to stale. Returns the count.
    pub fn invalidate_matches_for_job(
        &self,
        job_id: i64,
        reason: &str,
    ) -> Result<usize, DatabaseError> {
        let count = self.conn().execute(
            "UPDATE job_match SET status = 'stale', invalidated_reason = ?1
             WHERE job_post_id = ?2 AND status = 'active'",
            params![reason, job_id],
        )?;
        if count > 0 {
            log::info!("Invalidated {} matches for job {}: {}", count, job_id, reason);
        }
        Ok(count)
    }

    /// Flip active matches belonging to any other resume to stale; used when
    /// the configured resume changes and old fingerprints become obsolete.
    pub fn invalidate_matches_for_other_resumes(
        &self,
        current_fingerprint: &str,
        reason: &str,
    ) -> Result<usize, DatabaseError> {
        let count = self.conn().execute(
            "UPDATE job_match SET status = 'stale', invalidated_reason = ?1
             WHERE resume_fingerprint != ?2 AND status = 'active'",
            params![reason, current_fingerprint],
        )?;
        Ok(count)
    }

    /// Flip all active matches for a resume to stale. Returns the count.
    pub fn invalidate_matches_for_resume(
        &self,
        resume_fingerprint: &str,
        reason: &str,
    ) -> Result<usize, DatabaseError> {
        let count = self.conn().execute(
            "UPDATE job_match SET status = 'stale', invalidated_reason = ?1
             WHERE resume_fingerprint = ?2 AND status = 'active'",
            params![reason, resume_fingerprint],
        )?;
        if count > 0 {
            log::info!("Invalidated {} matches for resume: {}", count, reason);
        }
        Ok(count)
    }
}

const MATCH_COLUMNS: &str = "id, job_post_id, resume_fingerprint, job_content_hash, status, \
     overall_score, fit_score, want_score, base_score, penalties, penalty_details, \
     required_coverage, preferred_coverage, job_similarity, match_type, notified, \
     calculated_at, invalidated_reason";

fn match_from_row(row: &Row) -> rusqlite::Result<JobMatchRow> {
    let details: Option<String> = row.get(10)?;
    Ok(JobMatchRow {
        id: row.get(0)?,
        job_post_id: row.get(1)?,
        resume_fingerprint: row.get(2)?,
        job_content_hash: row.get(3)?,
        status: row.get(4)?,
        overall_score: row.get(5)?,
        fit_score: row.get(6)?,
        want_score: row.get(7)?,
        base_score: row.get(8)?,
        penalties: row.get(9)?,
        penalty_details: details.and_then(|s| serde_json::from_str(&s).ok()),
        required_coverage: row.get(11)?,
        preferred_coverage: row.get(12)?,
        job_similarity: row.get(13)?,
        match_type: row.get(14)?,
        notified: row.get(15)?,
        calculated_at: row.get(16)?,
        invalidated_reason: row.get(17)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use rusqlite::Connection;
    use serde_json::json;

    fn setup() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        let job_id = {
            let repo = JobRepository::new(&conn);
            repo.create_job_post("Engineer", "Acme", "Berlin", None, "fp1")
                .unwrap()
        };
        (conn, job_id)
    }

    fn scores(overall: f64) -> MatchScores {
        MatchScores {
            overall_score: overall,
            fit_score: overall,
            want_score: 0.0,
            base_score: overall,
            penalties: 0.0,
            penalty_details: json!({"details": [], "total": 0.0}),
            required_coverage: 1.0,
            preferred_coverage: 0.0,
            job_similarity: 0.8,
            match_type: "requirements_only".to_string(),
        }
    }

    #[test]
    fn insert_then_load_preserves_score_components() {
        let (conn, job_id) = setup();
        let repo = JobRepository::new(&conn);

        let id = repo
            .insert_match(job_id, "resume_fp", Some("hash1"), &scores(87.5))
            .unwrap();
        let row = repo.get_active_match(job_id, "resume_fp").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.overall_score, 87.5);
        assert_eq!(row.fit_score, 87.5);
        assert_eq!(row.job_similarity, 0.8);
        assert!(!row.notified);
        assert_eq!(row.job_content_hash.as_deref(), Some("hash1"));
    }

    #[test]
    fn stale_rows_are_excluded_from_active_lookup() {
        let (conn, job_id) = setup();
        let repo = JobRepository::new(&conn);

        let id = repo
            .insert_match(job_id, "resume_fp", Some("hash1"), &scores(50.0))
            .unwrap();
        repo.mark_match_stale(id, "Job content updated").unwrap();

        assert!(repo.get_active_match(job_id, "resume_fp").unwrap().is_none());
        let stale = repo.get_match_by_id(id).unwrap().unwrap();
        assert_eq!(stale.status, "stale");
        assert_eq!(stale.invalidated_reason.as_deref(), Some("Job content updated"));
    }

    #[test]
    fn children_are_replaced_wholesale() {
        let (conn, job_id) = setup();
        let repo = JobRepository::new(&conn);
        let req_id = repo
            .save_requirement(job_id, "required", "Python", &json!({}), 0, None, None)
            .unwrap();
        let match_id = repo
            .insert_match(job_id, "resume_fp", None, &scores(70.0))
            .unwrap();

        repo.replace_match_requirements(
            match_id,
            &[MatchRequirementPayload {
                requirement_id: req_id,
                evidence_text: "old evidence".to_string(),
                evidence_section: Some("Experience".to_string()),
                similarity_score: 0.7,
                is_covered: true,
                req_type: "required".to_string(),
            }],
        )
        .unwrap();
        repo.replace_match_requirements(
            match_id,
            &[MatchRequirementPayload {
                requirement_id: req_id,
                evidence_text: "new evidence".to_string(),
                evidence_section: None,
                similarity_score: 0.9,
                is_covered: true,
                req_type: "required".to_string(),
            }],
        )
        .unwrap();

        let children = repo.get_match_requirements(match_id).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].evidence_text, "new evidence");
    }

    #[test]
    fn bulk_invalidation_flips_only_active_rows() {
        let (conn, job_id) = setup();
        let repo = JobRepository::new(&conn);

        let a = repo
            .insert_match(job_id, "fp_a", None, &scores(60.0))
            .unwrap();
        repo.mark_match_stale(a, "earlier").unwrap();
        repo.insert_match(job_id, "fp_b", None, &scores(61.0))
            .unwrap();

        let count = repo
            .invalidate_matches_for_job(job_id, "Job content updated")
            .unwrap();
        assert_eq!(count, 1);

        let earlier = repo.get_match_by_id(a).unwrap().unwrap();
        assert_eq!(earlier.invalidated_reason.as_deref(), Some("earlier"));
    }
}
