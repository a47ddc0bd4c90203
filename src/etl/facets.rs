//! Facet extraction with claim-based concurrency
//!
//! Multiple workers pull batches through the atomic claim in the repository;
//! the claim transaction is the only cross-worker synchronization. Failed
//! jobs go back to pending with their retry count already bumped, so poison
//! pills drift into quarantine after `max_retries` attempts.

use std::path::PathBuf;

use rusqlite::{Connection, TransactionBehavior};

use crate::ai::client::ExtractionClient;
use crate::ai::types::{ExtractionOutcome, FACET_KEYS};
use crate::db::open_connection;
use crate::errors::{DatabaseError, JobRadarError};
use crate::orchestrator::StopSignal;
use crate::repository::{JobPost, JobRepository};

#[derive(Debug, Clone)]
pub struct FacetExtractionConfig {
    /// Jobs claimed per batch per worker
    pub batch_limit: usize,
    /// Minutes before an in-progress claim is considered abandoned
    pub claim_timeout_minutes: i64,
    /// Attempts before a job is quarantined
    pub max_retries: i64,
    pub worker_count: usize,
}

impl Default for FacetExtractionConfig {
    fn default() -> Self {
        Self {
            batch_limit: 20,
            claim_timeout_minutes: 30,
            max_retries: 5,
            worker_count: num_cpus::get().min(4),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct FacetStageReport {
    pub processed: usize,
    pub failed: usize,
}

pub struct FacetExtractor {
    client: ExtractionClient,
    db_path: PathBuf,
    config: FacetExtractionConfig,
}

impl FacetExtractor {
    pub fn new(client: ExtractionClient, db_path: PathBuf, config: FacetExtractionConfig) -> Self {
        Self {
            client,
            db_path,
            config,
        }
    }

    /// Run the worker pool until no claimable jobs remain or the stop signal
    /// fires.
    pub async fn run(&self, stop: &StopSignal) -> Result<FacetStageReport, JobRadarError> {
        let mut handles = Vec::new();
        for n in 0..self.config.worker_count.max(1) {
            let worker_id = format!("facet-worker-{}", n);
            let client = self.client.clone();
            let db_path = self.db_path.clone();
            let config = self.config.clone();
            let stop = stop.clone();
            handles.push(tokio::spawn(async move {
                facet_worker_loop(&worker_id, client, &db_path, &config, &stop).await
            }));
        }

        let mut report = FacetStageReport::default();
        for handle in handles {
            match handle.await {
                Ok(Ok(worker_report)) => {
                    report.processed += worker_report.processed;
                    report.failed += worker_report.failed;
                }
                Ok(Err(e)) => log::error!("Facet worker failed: {}", e),
                Err(e) => log::error!("Facet worker panicked: {}", e),
            }
        }
        Ok(report)
    }
}

async fn facet_worker_loop(
    worker_id: &str,
    client: ExtractionClient,
    db_path: &PathBuf,
    config: &FacetExtractionConfig,
    stop: &StopSignal,
) -> Result<FacetStageReport, JobRadarError> {
    let mut conn = open_connection(db_path).map_err(DatabaseError::from)?;
    let mut report = FacetStageReport::default();

    loop {
        if stop.is_set() {
            break;
        }

        let claimed = claim_batch(&mut conn, worker_id, config)?;
        if claimed.is_empty() {
            break;
        }
        log::info!("{} claimed {} jobs", worker_id, claimed.len());

        for job in claimed {
            if stop.is_set() {
                // Release the claim; the retry counter already charged this
                // attempt and the next cycle picks the job up again.
                let repo = JobRepository::new(&conn);
                repo.mark_job_facets_failed(job.id, None)?;
                continue;
            }

            match process_claimed_job(&mut conn, &client, &job).await {
                Ok(saved) => {
                    log::info!(
                        "{} saved {} facets for job {}",
                        worker_id,
                        saved,
                        job.id
                    );
                    report.processed += 1;
                }
                Err(e) => {
                    log::error!(
                        "Facet extraction failed for job {} ({}): {}",
                        job.id,
                        worker_id,
                        e
                    );
                    let repo = JobRepository::new(&conn);
                    repo.mark_job_facets_failed(job.id, Some(&e.to_string()))?;
                    report.failed += 1;
                }
            }
        }
    }

    Ok(report)
}

/// Claim a batch inside an immediate transaction: SQLite's writer lock makes
/// the reset / quarantine / claim sequence atomic across workers.
fn claim_batch(
    conn: &mut Connection,
    worker_id: &str,
    config: &FacetExtractionConfig,
) -> Result<Vec<JobPost>, JobRadarError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DatabaseError::from)?;
    let claimed = {
        let repo = JobRepository::new(&tx);
        repo.claim_jobs_for_facet_extraction(
            config.batch_limit,
            worker_id,
            config.claim_timeout_minutes,
            config.max_retries,
        )?
    };
    tx.commit().map_err(DatabaseError::from)?;
    Ok(claimed)
}

async fn process_claimed_job(
    conn: &mut Connection,
    client: &ExtractionClient,
    job: &JobPost,
) -> Result<usize, JobRadarError> {
    log::info!("Extracting facets for job {}: {}", job.id, job.title);

    let description = job.description.as_deref().unwrap_or_default();
    let facets = match client.extract_facets(description).await? {
        ExtractionOutcome::Valid(facets) => facets,
        ExtractionOutcome::InvalidSchema(raw) => {
            return Err(JobRadarError::Validation(
                crate::errors::ValidationError::InvalidFormat(format!(
                    "facet payload failed schema validation: {}",
                    raw
                )),
            ));
        }
    };

    let content_hash = job.content_hash.clone().unwrap_or_default();

    // Exact replacement: delete + upsert + status flip in one transaction
    let tx = conn.transaction().map_err(DatabaseError::from)?;
    let saved_count = {
        let repo = JobRepository::new(&tx);
        repo.delete_facets_for_job(job.id)?;

        let mut saved = 0;
        for facet_key in FACET_KEYS {
            let facet_text = facets.text_for(facet_key);
            if facet_text.is_empty() {
                log::debug!("Empty facet '{}' for job {}", facet_key, job.id);
                continue;
            }
            repo.upsert_facet(job.id, facet_key, facet_text, None, &content_hash)?;
            saved += 1;
        }

        repo.mark_job_facets_extracted(job.id, &content_hash)?;
        saved
    };
    tx.commit().map_err(DatabaseError::from)?;

    Ok(saved_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockProvider;
    use crate::db::init_database;
    use serde_json::json;
    use std::sync::Arc;

    fn seed_claimable_job(conn: &Connection, fp: &str) -> i64 {
        let repo = JobRepository::new(conn);
        let id = repo
            .create_job_post("Engineer", "Acme", "Berlin", None, fp)
            .unwrap();
        conn.execute(
            "UPDATE job_post SET is_embedded = 1, description = 'remote python role',
                                 content_hash = 'c1' WHERE id = ?",
            [id],
        )
        .unwrap();
        id
    }

    fn seeded_db(path: &std::path::Path, jobs: usize) {
        let conn = open_connection(path).unwrap();
        init_database(&conn).unwrap();
        for n in 0..jobs {
            seed_claimable_job(&conn, &format!("fp{}", n));
        }
    }

    #[tokio::test]
    async fn successful_extraction_marks_done_and_saves_nonempty_facets() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("t.db");
        seeded_db(&db, 1);

        let mock = MockProvider::new();
        mock.register_structured(
            "job_facet_extraction",
            json!({
                "remote_flexibility": "Fully remote",
                "compensation": "",
                "learning_growth": "",
                "company_culture": "",
                "work_life_balance": "",
                "tech_stack": "Python, AWS",
                "visa_sponsorship": ""
            }),
        );
        let extractor = FacetExtractor::new(
            ExtractionClient::new(Arc::new(mock)),
            db.clone(),
            FacetExtractionConfig {
                worker_count: 1,
                ..Default::default()
            },
        );

        let report = extractor.run(&StopSignal::new()).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 0);

        let conn = open_connection(&db).unwrap();
        let repo = JobRepository::new(&conn);
        let job = repo.get_job_by_fingerprint("fp0").unwrap().unwrap();
        assert_eq!(job.facet_status, "done");
        assert_eq!(job.facet_extraction_hash.as_deref(), Some("c1"));
        assert!(job.facet_claimed_at.is_none());

        let facets = repo.get_facets_for_job(job.id).unwrap();
        assert_eq!(facets.len(), 2);
    }

    #[tokio::test]
    async fn invalid_payload_returns_job_to_pending_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("t.db");
        seeded_db(&db, 1);

        let mock = MockProvider::new();
        mock.register_structured("job_facet_extraction", json!({"tech_stack": 42}));
        let extractor = FacetExtractor::new(
            ExtractionClient::new(Arc::new(mock)),
            db.clone(),
            FacetExtractionConfig {
                worker_count: 1,
                ..Default::default()
            },
        );

        let report = extractor.run(&StopSignal::new()).await.unwrap();
        assert_eq!(report.failed, 1);

        let conn = open_connection(&db).unwrap();
        let repo = JobRepository::new(&conn);
        let job = repo.get_job_by_fingerprint("fp0").unwrap().unwrap();
        assert_eq!(job.facet_status, "pending");
        assert_eq!(job.facet_retry_count, 1);
        assert!(job.facet_last_error.is_some());
    }

    #[tokio::test]
    async fn concurrent_workers_claim_disjoint_sets() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("t.db");
        seeded_db(&db, 10);

        // Two claimers with limit 5 against 10 pending jobs
        let db_a = db.clone();
        let db_b = db.clone();
        let claim = |db: PathBuf, worker: String| async move {
            let mut conn = open_connection(&db).unwrap();
            let config = FacetExtractionConfig {
                batch_limit: 5,
                ..Default::default()
            };
            claim_batch(&mut conn, &worker, &config)
                .unwrap()
                .into_iter()
                .map(|j| j.id)
                .collect::<Vec<i64>>()
        };

        let (a, b) = tokio::join!(
            tokio::spawn(claim(db_a, "worker-a".to_string())),
            tokio::spawn(claim(db_b, "worker-b".to_string()))
        );
        let a = a.unwrap();
        let b = b.unwrap();

        assert_eq!(a.len(), 5);
        assert_eq!(b.len(), 5);
        for id in &a {
            assert!(!b.contains(id), "job {} claimed by both workers", id);
        }
    }
}
