//! Match persistence with stale-history semantics
//!
//! One active row per (job, resume). A content-hash change retires the old
//! row as history and writes a fresh active row so the notification path
//! sees it as new. Children are always replaced wholesale.

use serde_json::json;

use crate::errors::JobRadarError;
use crate::matching::scorer::ScoredJobMatch;
use crate::repository::matches::{MatchRequirementPayload, MatchScores};
use crate::repository::JobRepository;

/// What saving one scored match did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SaveOutcome {
    /// No active row existed; new row inserted
    SavedNew,
    /// Active row was stale (content changed); retired + new row inserted
    Replaced,
    /// Active row updated in place
    Updated,
    /// Active row exists with matching hash and recalculation is off
    Skipped,
}

/// Save one scored match inside the caller's transaction.
pub fn save_match(
    repo: &JobRepository,
    scored: &ScoredJobMatch,
    recalculate_existing: bool,
) -> Result<SaveOutcome, JobRadarError> {
    let job = &scored.job;
    let scores = to_match_scores(scored);
    let children = to_children(scored);

    let existing = repo.get_active_match(job.id, &scored.resume_fingerprint)?;

    let (match_id, outcome) = match existing {
        Some(existing_row) => {
            let content_changed =
                existing_row.job_content_hash.as_deref() != job.content_hash.as_deref();
            if content_changed {
                // Preserve history: stale shows why it was replaced
                repo.mark_match_stale(existing_row.id, "Job content updated")?;
                log::info!(
                    "Invalidated match for job {} due to content change",
                    job.id
                );
                let id = repo.insert_match(
                    job.id,
                    &scored.resume_fingerprint,
                    job.content_hash.as_deref(),
                    &scores,
                )?;
                (id, SaveOutcome::Replaced)
            } else if !recalculate_existing {
                log::debug!("Skipping existing match for job {}", job.id);
                return Ok(SaveOutcome::Skipped);
            } else {
                repo.update_match_scores(existing_row.id, job.content_hash.as_deref(), &scores)?;
                (existing_row.id, SaveOutcome::Updated)
            }
        }
        None => {
            let id = repo.insert_match(
                job.id,
                &scored.resume_fingerprint,
                job.content_hash.as_deref(),
                &scores,
            )?;
            (id, SaveOutcome::SavedNew)
        }
    };

    repo.replace_match_requirements(match_id, &children)?;

    log::info!(
        "Saved match for job {}: score={:.1} (fit={:.1}, want={}, penalties={:.1})",
        job.id,
        scored.overall_score,
        scored.fit_score,
        scored
            .want_score
            .map_or("n/a".to_string(), |w| format!("{:.1}", w)),
        scored.penalties
    );

    Ok(outcome)
}

fn to_match_scores(scored: &ScoredJobMatch) -> MatchScores {
    MatchScores {
        overall_score: scored.overall_score,
        fit_score: scored.fit_score,
        want_score: scored.want_score.unwrap_or(0.0),
        base_score: scored.base_score,
        penalties: scored.penalties,
        penalty_details: json!({
            "details": scored.penalty_details,
            "total": scored.penalties,
        }),
        required_coverage: scored.required_coverage,
        preferred_coverage: scored.preferred_coverage,
        job_similarity: scored.job_similarity,
        match_type: scored.match_type.clone(),
    }
}

fn to_children(scored: &ScoredJobMatch) -> Vec<MatchRequirementPayload> {
    scored
        .matched_requirements
        .iter()
        .chain(scored.missing_requirements.iter())
        .map(|req_match| MatchRequirementPayload {
            requirement_id: req_match.requirement.id,
            evidence_text: req_match.evidence_text.clone().unwrap_or_default(),
            evidence_section: req_match.evidence_section.clone(),
            similarity_score: req_match.similarity,
            is_covered: req_match.is_covered,
            req_type: req_match.requirement.req_type.clone(),
        })
        .collect()
}
