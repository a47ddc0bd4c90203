//! Pipeline orchestration: stage sequencing, per-item units of work,
//! cooperative cancellation
//!
//! Each stage iterates a bounded batch; every item runs in its own
//! transaction so one malformed description cannot abort the batch. The stop
//! signal is checked between items and before blocking calls.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::ai::client::ExtractionClient;
use crate::config::AppConfig;
use crate::db::{database_path_from_url, open_connection};
use crate::errors::{DatabaseError, JobRadarError};
use crate::etl::embed::Embedder;
use crate::etl::extract::{ExtractStatus, RequirementExtractor};
use crate::etl::facets::{FacetExtractionConfig, FacetExtractor, FacetStageReport};
use crate::etl::ingest::{ingest_one, IngestOutcome};
use crate::etl::resume::ResumeProfiler;
use crate::matching::matcher::MatcherService;
use crate::matching::persistence::{save_match, SaveOutcome};
use crate::matching::scorer::{ScoredJobMatch, ScoringService};
use crate::notify::builder::job_content;
use crate::notify::service::NotificationService;
use crate::repository::JobRepository;
use crate::scraper::ScraperClient;
use crate::vectors::normalize;

/// Batch limits per cycle, matching the stage budgets of the original driver
const EXTRACTION_BATCH_LIMIT: usize = 200;
const EMBEDDING_BATCH_LIMIT: usize = 100;
const REQUIREMENT_EMBEDDING_BATCH_LIMIT: usize = 1000;

/// Cooperative stop signal shared across stages and workers.
///
/// Sources: OS termination signals and the caller-supplied token for
/// web-triggered runs. In-flight I/O finishes; no new item starts.
#[derive(Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep up to `duration`, returning early when the signal fires
    pub async fn wait(&self, duration: Duration) {
        let slice = Duration::from_millis(200);
        let mut remaining = duration;
        while !self.is_set() && remaining > Duration::ZERO {
            let step = remaining.min(slice);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    Etl,
    Matching,
    All,
}

/// Per-stage counters aggregated into the cycle result
#[derive(Debug, Default, Clone)]
pub struct PipelineReport {
    pub jobs_gathered: usize,
    pub ingest_failures: usize,
    pub jobs_extracted: usize,
    pub extraction_failures: usize,
    pub jobs_embedded: usize,
    pub requirements_embedded: usize,
    pub embedding_failures: usize,
    pub facets: FacetStageReport,
    pub facet_embedding_failures: usize,
    pub resume_processed: bool,
    pub resume_changed: bool,
    pub matches_scored: usize,
    pub matches_saved: usize,
    pub matches_skipped: usize,
    pub notifications_sent: usize,
    pub interrupted: bool,
}

pub struct Orchestrator {
    config: AppConfig,
    db_path: PathBuf,
    client: ExtractionClient,
    notifications: Option<Arc<NotificationService>>,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        client: ExtractionClient,
        notifications: Option<Arc<NotificationService>>,
    ) -> Self {
        let db_path = database_path_from_url(&config.database.url);
        Self {
            config,
            db_path,
            client,
            notifications,
        }
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Run one full cycle in the given mode. Returns a best-effort partial
    /// report when cancelled.
    pub async fn run_cycle(
        &self,
        mode: PipelineMode,
        stop: &StopSignal,
    ) -> Result<PipelineReport, JobRadarError> {
        let mut report = PipelineReport::default();

        if matches!(mode, PipelineMode::Etl | PipelineMode::All) {
            self.run_etl_pipeline(stop, &mut report).await?;
        }
        if stop.is_set() {
            report.interrupted = true;
            return Ok(report);
        }
        if matches!(mode, PipelineMode::Matching | PipelineMode::All) {
            self.run_matching_pipeline(stop, &mut report).await?;
        }

        report.interrupted = stop.is_set();
        Ok(report)
    }

    // ── ETL ────────────────────────────────────────────────────────────

    async fn run_etl_pipeline(
        &self,
        stop: &StopSignal,
        report: &mut PipelineReport,
    ) -> Result<(), JobRadarError> {
        log::info!("=== ETL: gathering jobs ===");
        self.gather_jobs(stop, report).await?;
        if stop.is_set() {
            return Ok(());
        }

        log::info!("=== ETL: extracting requirements ===");
        self.extract_requirements(stop, report).await?;
        if stop.is_set() {
            return Ok(());
        }

        // Summary embeddings must exist before the facet claim predicate
        // (is_embedded) can select anything, so the embed pass runs first.
        log::info!("=== ETL: embedding jobs and requirements ===");
        self.embed_jobs_and_requirements(stop, report).await?;
        if stop.is_set() {
            return Ok(());
        }

        log::info!("=== ETL: extracting facets ===");
        let facet_extractor = FacetExtractor::new(
            self.client.clone(),
            self.db_path.clone(),
            FacetExtractionConfig::default(),
        );
        report.facets = facet_extractor.run(stop).await?;
        if stop.is_set() {
            return Ok(());
        }

        log::info!("=== ETL: embedding facets ===");
        self.embed_facets(stop, report).await?;
        if stop.is_set() {
            return Ok(());
        }

        log::info!("=== ETL: processing resume ===");
        self.process_resume(stop, report).await?;

        Ok(())
    }

    async fn gather_jobs(
        &self,
        stop: &StopSignal,
        report: &mut PipelineReport,
    ) -> Result<(), JobRadarError> {
        let jobspy = match &self.config.jobspy {
            Some(jobspy) => jobspy,
            None => {
                log::info!("No scraper service configured, skipping gather");
                return Ok(());
            }
        };
        if self.config.scrapers.is_empty() {
            log::info!("No scrapers configured, skipping gather");
            return Ok(());
        }

        let scraper_client = ScraperClient::new(jobspy)?;
        let mut conn = open_connection(&self.db_path).map_err(DatabaseError::from)?;

        for scraper_cfg in &self.config.scrapers {
            if stop.is_set() {
                break;
            }

            let task_id = match scraper_client.submit(scraper_cfg).await {
                Ok(task_id) => task_id,
                Err(e) => {
                    log::error!("Failed to submit scrape job: {}", e);
                    continue;
                }
            };

            let jobs = match scraper_client.wait_for_result(&task_id, stop).await {
                Ok(Some(jobs)) => jobs,
                Ok(None) => continue,
                Err(e) => {
                    log::error!("Failed waiting for task {}: {}", task_id, e);
                    continue;
                }
            };

            let site_name = scraper_cfg
                .site_type
                .first()
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            log::info!("Processing {} jobs for {}", jobs.len(), site_name);

            for raw_job in &jobs {
                if stop.is_set() {
                    break;
                }
                match self.ingest_in_transaction(&mut conn, raw_job, &site_name) {
                    Ok(IngestOutcome::Skipped) => {}
                    Ok(_) => report.jobs_gathered += 1,
                    Err(e) => {
                        log::error!("Ingest failed: {}", e);
                        report.ingest_failures += 1;
                    }
                }
            }
        }

        log::info!("Gathered {} jobs", report.jobs_gathered);
        Ok(())
    }

    /// One ingest item = one transaction; errors roll back just that item.
    fn ingest_in_transaction(
        &self,
        conn: &mut rusqlite::Connection,
        raw_job: &Value,
        site_name: &str,
    ) -> Result<IngestOutcome, JobRadarError> {
        let tx = conn.transaction().map_err(DatabaseError::from)?;
        let outcome = {
            let repo = JobRepository::new(&tx);
            ingest_one(&repo, raw_job, site_name)?
        };
        tx.commit().map_err(DatabaseError::from)?;
        Ok(outcome)
    }

    async fn extract_requirements(
        &self,
        stop: &StopSignal,
        report: &mut PipelineReport,
    ) -> Result<(), JobRadarError> {
        let mut conn = open_connection(&self.db_path).map_err(DatabaseError::from)?;
        let extractor = RequirementExtractor::new(self.client.clone());

        let pending = {
            let repo = JobRepository::new(&conn);
            repo.get_unextracted_jobs(EXTRACTION_BATCH_LIMIT)?
        };
        log::info!("{} jobs pending extraction", pending.len());

        for job in pending {
            if stop.is_set() {
                break;
            }
            match extractor.extract_one(&mut conn, &job).await {
                Ok(ExtractStatus::Extracted { .. }) => report.jobs_extracted += 1,
                Ok(ExtractStatus::InvalidSchema) => report.extraction_failures += 1,
                Err(e) => {
                    log::error!("Extraction failed for job {}: {}", job.id, e);
                    report.extraction_failures += 1;
                }
            }
        }
        Ok(())
    }

    async fn embed_jobs_and_requirements(
        &self,
        stop: &StopSignal,
        report: &mut PipelineReport,
    ) -> Result<(), JobRadarError> {
        let mut conn = open_connection(&self.db_path).map_err(DatabaseError::from)?;
        let embedder = Embedder::new(self.client.clone());

        let pending_jobs = {
            let repo = JobRepository::new(&conn);
            repo.get_unembedded_jobs(EMBEDDING_BATCH_LIMIT)?
        };
        for job in pending_jobs {
            if stop.is_set() {
                return Ok(());
            }
            match embedder.embed_job_one(&mut conn, &job).await {
                Ok(()) => report.jobs_embedded += 1,
                Err(e) => {
                    log::error!("Embedding failed for job {}: {}", job.id, e);
                    report.embedding_failures += 1;
                }
            }
        }

        let pending_requirements = {
            let repo = JobRepository::new(&conn);
            repo.get_unembedded_requirements(REQUIREMENT_EMBEDDING_BATCH_LIMIT)?
        };
        for requirement in pending_requirements {
            if stop.is_set() {
                return Ok(());
            }
            match embedder.embed_requirement_one(&mut conn, &requirement).await {
                Ok(()) => report.requirements_embedded += 1,
                Err(e) => {
                    log::error!(
                        "Embedding failed for requirement {}: {}",
                        requirement.id,
                        e
                    );
                    report.embedding_failures += 1;
                }
            }
        }

        Ok(())
    }

    async fn embed_facets(
        &self,
        stop: &StopSignal,
        report: &mut PipelineReport,
    ) -> Result<(), JobRadarError> {
        let mut conn = open_connection(&self.db_path).map_err(DatabaseError::from)?;
        let embedder = Embedder::new(self.client.clone());

        let pending = {
            let repo = JobRepository::new(&conn);
            repo.get_jobs_with_unembedded_facets(EMBEDDING_BATCH_LIMIT)?
        };
        for job in pending {
            if stop.is_set() {
                break;
            }
            if let Err(e) = embedder.embed_facets_one(&mut conn, &job).await {
                log::error!("Facet embedding failed for job {}: {}", job.id, e);
                report.facet_embedding_failures += 1;
            }
        }
        Ok(())
    }

    async fn process_resume(
        &self,
        stop: &StopSignal,
        report: &mut PipelineReport,
    ) -> Result<(), JobRadarError> {
        let resume_file = PathBuf::from(&self.config.etl.resume.resume_file);
        if !resume_file.exists() {
            log::warn!("Resume file not found: {}", resume_file.display());
            return Ok(());
        }

        let mut conn = open_connection(&self.db_path).map_err(DatabaseError::from)?;
        let profiler = ResumeProfiler::new(self.client.clone());

        match profiler.process_resume(&mut conn, &resume_file, stop).await {
            Ok(outcome) => {
                report.resume_processed = true;
                report.resume_changed = outcome.changed;
                if outcome.changed && self.config.matching.invalidate_on_resume_change {
                    let repo = JobRepository::new(&conn);
                    let count = repo
                        .invalidate_matches_for_other_resumes(&outcome.fingerprint, "Resume changed")?;
                    if count > 0 {
                        log::info!("Invalidated {} matches from previous resumes", count);
                    }
                }
            }
            Err(e) => {
                log::error!("Resume processing failed: {}", e);
            }
        }
        Ok(())
    }

    // ── Matching ───────────────────────────────────────────────────────

    async fn run_matching_pipeline(
        &self,
        stop: &StopSignal,
        report: &mut PipelineReport,
    ) -> Result<(), JobRadarError> {
        let matching = &self.config.matching;
        if !matching.enabled {
            log::info!("=== MATCHING: skipped (disabled in config) ===");
            return Ok(());
        }

        let mut conn = open_connection(&self.db_path).map_err(DatabaseError::from)?;

        let resume_fingerprint = {
            let repo = JobRepository::new(&conn);
            match repo.get_latest_resume_fingerprint()? {
                Some(fingerprint) => fingerprint,
                None => {
                    log::error!("No resume found in database. Run ETL first.");
                    return Ok(());
                }
            }
        };

        // User wants, embedded line by line (model calls stay outside any
        // transaction)
        let want_embeddings = self.load_want_embeddings().await?;

        log::info!("=== MATCHING: vector retrieval ===");
        let matcher = MatcherService::new(self.client.clone(), matching.matcher.clone());
        let require_remote = if matching.scorer.wants_remote {
            Some(true)
        } else {
            None
        };
        let preliminaries = matcher
            .match_resume_two_stage(&mut conn, &resume_fingerprint, require_remote, stop)
            .await?;
        log::info!("Matched against {} jobs", preliminaries.len());

        if stop.is_set() {
            return Ok(());
        }

        log::info!("=== MATCHING: scoring ===");
        let scorer = ScoringService::new(matching.scorer.clone());
        let scored = scorer.score_matches(
            &conn,
            &preliminaries,
            &matching.result_policy,
            want_embeddings.as_deref(),
            stop,
        )?;
        report.matches_scored = scored.len();

        if !scored.is_empty() {
            log::info!("Top matches:");
            for (i, m) in scored.iter().take(5).enumerate() {
                log::info!(
                    "  {}. {} @ {}: overall={:.1}/100 (fit={:.1}, want={})",
                    i + 1,
                    m.job.title,
                    m.job.company,
                    m.overall_score,
                    m.fit_score,
                    m.want_score
                        .map_or("n/a".to_string(), |w| format!("{:.1}", w)),
                );
            }
        }

        if stop.is_set() {
            return Ok(());
        }

        log::info!("=== MATCHING: saving matches ===");
        for scored_match in &scored {
            if stop.is_set() {
                break;
            }
            match self.save_match_in_transaction(&mut conn, scored_match) {
                Ok(SaveOutcome::Skipped) => report.matches_skipped += 1,
                Ok(_) => report.matches_saved += 1,
                Err(e) => {
                    log::error!("Failed saving match job_id={}: {}", scored_match.job.id, e);
                }
            }
        }
        log::info!("Saved {} matches", report.matches_saved);

        if stop.is_set() {
            return Ok(());
        }

        report.notifications_sent = self.send_notifications(&mut conn, &scored, stop).await;

        Ok(())
    }

    async fn load_want_embeddings(&self) -> Result<Option<Vec<Vec<f32>>>, JobRadarError> {
        let wants_file = match &self.config.matching.user_wants_file {
            Some(path) => PathBuf::from(path),
            None => return Ok(None),
        };
        let contents = match std::fs::read_to_string(&wants_file) {
            Ok(contents) => contents,
            Err(e) => {
                log::warn!("User wants file not found: {} ({})", wants_file.display(), e);
                return Ok(None);
            }
        };

        let wants: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if wants.is_empty() {
            return Ok(None);
        }
        log::info!("Loaded {} user wants from {}", wants.len(), wants_file.display());

        let mut embeddings = Vec::with_capacity(wants.len());
        for want in wants {
            let mut vector = self.client.embed(want).await?;
            normalize(&mut vector);
            embeddings.push(vector);
        }
        Ok(Some(embeddings))
    }

    fn save_match_in_transaction(
        &self,
        conn: &mut rusqlite::Connection,
        scored: &ScoredJobMatch,
    ) -> Result<SaveOutcome, JobRadarError> {
        let tx = conn.transaction().map_err(DatabaseError::from)?;
        let outcome = {
            let repo = JobRepository::new(&tx);
            save_match(&repo, scored, self.config.matching.recalculate_existing)?
        };
        tx.commit().map_err(DatabaseError::from)?;
        Ok(outcome)
    }

    async fn send_notifications(
        &self,
        conn: &mut rusqlite::Connection,
        scored: &[ScoredJobMatch],
        stop: &StopSignal,
    ) -> usize {
        let notifications = &self.config.notifications;
        let service = match &self.notifications {
            Some(service) if notifications.enabled => Arc::clone(service),
            _ => {
                log::info!("=== NOTIFICATIONS: skipped (disabled) ===");
                return 0;
            }
        };

        let user_id = notifications
            .user_id
            .clone()
            .unwrap_or_else(|| "default_user".to_string());

        let high_score: Vec<&ScoredJobMatch> = scored
            .iter()
            .filter(|m| m.overall_score >= notifications.min_score_threshold)
            .collect();
        let high_score_count = high_score.len();

        let mut notified = 0;
        if notifications.notify_on_new_match {
            for scored_match in high_score {
                if stop.is_set() {
                    break;
                }

                let match_row = {
                    let repo = JobRepository::new(conn);
                    match repo
                        .get_active_match(scored_match.job.id, &scored_match.resume_fingerprint)
                    {
                        Ok(Some(row)) => row,
                        Ok(None) => continue,
                        Err(e) => {
                            log::error!("Failed to load match record: {}", e);
                            continue;
                        }
                    }
                };
                if match_row.notified {
                    log::debug!("Match {} already notified, skipping", match_row.id);
                    continue;
                }

                let requirements_total = scored_match.matched_requirements.len()
                    + scored_match.missing_requirements.len();
                let content = job_content(
                    &scored_match.job.title,
                    &scored_match.job.company,
                    &scored_match.job.location_text,
                    scored_match.job.is_remote.unwrap_or(false),
                    format_salary(&scored_match.job.salary_min, &scored_match.job.salary_max,
                                  &scored_match.job.currency).as_deref(),
                    scored_match.job.job_level.as_deref(),
                    scored_match.overall_score,
                    scored_match.fit_score,
                    scored_match.want_score,
                    requirements_total,
                    scored_match.matched_requirements.len(),
                    None,
                );

                let dispatched = service
                    .notify_new_match(&user_id, match_row.id, content, scored_match.overall_score)
                    .await;

                if dispatched > 0 {
                    notified += 1;
                    let repo = JobRepository::new(conn);
                    if let Err(e) = repo.set_match_notified(match_row.id) {
                        log::error!("Failed to persist notified flag: {}", e);
                    }
                }
            }
        }

        if notifications.notify_on_batch_complete && !stop.is_set() {
            service
                .notify_batch_complete(&user_id, scored.len(), high_score_count)
                .await;
        }

        log::info!("Sent {} match notifications", notified);
        notified
    }
}

fn format_salary(
    salary_min: &Option<f64>,
    salary_max: &Option<f64>,
    currency: &Option<String>,
) -> Option<String> {
    let currency = currency.as_deref().unwrap_or("");
    match (salary_min, salary_max) {
        (Some(min), Some(max)) => Some(format!("{:.0}-{:.0} {}", min, max, currency)),
        (None, Some(max)) => Some(format!("up to {:.0} {}", max, currency)),
        (Some(min), None) => Some(format!("from {:.0} {}", min, currency)),
        (None, None) => None,
    }
    .map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_signal_wait_returns_early() {
        let stop = StopSignal::new();
        let waiter = stop.clone();
        let handle = tokio::spawn(async move {
            let started = std::time::Instant::now();
            waiter.wait(Duration::from_secs(30)).await;
            started.elapsed()
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.set();
        let elapsed = handle.await.unwrap();
        assert!(elapsed < Duration::from_secs(2), "waited {:?}", elapsed);
    }

    #[test]
    fn salary_formats_cover_partial_bounds() {
        assert_eq!(
            format_salary(&Some(90000.0), &Some(120000.0), &Some("EUR".to_string())),
            Some("90000-120000 EUR".to_string())
        );
        assert_eq!(
            format_salary(&None, &Some(100000.0), &None),
            Some("up to 100000".to_string())
        );
        assert_eq!(format_salary(&None, &None, &None), None);
    }
}
