//! Stage 2: rule-based scoring
//!
//! Fit ("can do the job") comes from requirement coverage, job similarity,
//! and capability penalties. Want ("does the job match what the candidate
//! wants") comes from semantic similarity between free-text wants and the
//! job's facet embeddings. Structured preference mismatches (location,
//! industry, role) are display-time filters and contribute no penalties.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use serde_json::{json, Value};

use crate::config::{FacetWeights, ResultPolicy, ScorerConfig};
use crate::errors::JobRadarError;
use crate::matching::matcher::{JobMatchPreliminary, RequirementMatchResult};
use crate::orchestrator::StopSignal;
use crate::repository::{JobPost, JobRepository};

/// Complete scored match result
#[derive(Debug, Clone)]
pub struct ScoredJobMatch {
    pub job: JobPost,
    pub overall_score: f64,
    pub fit_score: f64,
    /// None when no wants or no facet embeddings were available
    pub want_score: Option<f64>,
    pub base_score: f64,
    pub penalties: f64,
    pub penalty_details: Vec<Value>,
    pub required_coverage: f64,
    pub preferred_coverage: f64,
    pub job_similarity: f64,
    pub matched_requirements: Vec<RequirementMatchResult>,
    pub missing_requirements: Vec<RequirementMatchResult>,
    pub resume_fingerprint: String,
    pub match_type: String,
}

/// Required and preferred coverage fractions; 0 when the denominator is 0
pub fn calculate_coverage(
    matched: &[RequirementMatchResult],
    missing: &[RequirementMatchResult],
) -> (f64, f64) {
    let required_total = matched
        .iter()
        .chain(missing)
        .filter(|r| r.requirement.req_type == "required")
        .count();
    let required_covered = matched
        .iter()
        .filter(|r| r.requirement.req_type == "required")
        .count();
    let preferred_total = matched
        .iter()
        .chain(missing)
        .filter(|r| r.requirement.req_type == "preferred")
        .count();
    let preferred_covered = matched
        .iter()
        .filter(|r| r.requirement.req_type == "preferred")
        .count();

    let required_coverage = if required_total > 0 {
        required_covered as f64 / required_total as f64
    } else {
        0.0
    };
    let preferred_coverage = if preferred_total > 0 {
        preferred_covered as f64 / preferred_total as f64
    } else {
        0.0
    };

    (required_coverage, preferred_coverage)
}

/// Capability penalties only: missing required skills, seniority mismatch,
/// compensation mismatch, experience shortfall.
///
/// A requirement receives at most one experience-shortfall penalty,
/// enforced by the penalized-requirement set.
pub fn calculate_fit_penalties(
    job: &JobPost,
    matched: &[RequirementMatchResult],
    missing: &[RequirementMatchResult],
    config: &ScorerConfig,
    best_experience_years: Option<f64>,
) -> (f64, Vec<Value>) {
    let mut penalties = 0.0;
    let mut details: Vec<Value> = Vec::new();

    let required_total = matched
        .iter()
        .chain(missing)
        .filter(|r| r.requirement.req_type == "required")
        .count();
    let required_covered = matched
        .iter()
        .filter(|r| r.requirement.req_type == "required")
        .count();
    let missing_required = required_total - required_covered;

    if missing_required > 0 {
        let amount = missing_required as f64 * config.penalty_missing_required;
        penalties += amount;
        let missing_texts: Vec<&str> = missing
            .iter()
            .filter(|r| r.requirement.req_type == "required")
            .take(3)
            .map(|r| r.requirement.text.as_str())
            .collect();
        details.push(json!({
            "type": "missing_required",
            "amount": amount,
            "reason": format!("{} required skill(s) not covered", missing_required),
            "details": missing_texts,
        }));
    }

    if let (Some(target), Some(job_level)) = (&config.target_seniority, &job.job_level) {
        let target = target.to_lowercase();
        let level = job_level.to_lowercase();
        let mismatch = (target == "junior" && (level.contains("senior") || level.contains("lead")))
            || (target == "senior" && (level.contains("junior") || level.contains("entry")));
        if mismatch {
            penalties += config.penalty_seniority_mismatch;
            details.push(json!({
                "type": "seniority_mismatch",
                "amount": config.penalty_seniority_mismatch,
                "reason": "Seniority level mismatch",
                "details": format!("Job level: {}, Target: {}", job_level, target),
            }));
        }
    }

    if let (Some(min_salary), Some(salary_max)) = (config.min_salary, job.salary_max) {
        if salary_max < min_salary {
            penalties += config.penalty_compensation_mismatch;
            details.push(json!({
                "type": "compensation_mismatch",
                "amount": config.penalty_compensation_mismatch,
                "reason": "Salary below minimum requirement",
                "details": format!("Job max: {}, User min: {}", salary_max, min_salary),
            }));
        }
    }

    if let Some(best_years) = best_experience_years {
        let mut penalized: HashSet<i64> = HashSet::new();
        for req_match in matched {
            let req = &req_match.requirement;
            let req_years = match req.min_years {
                Some(y) if y > best_years => y,
                _ => continue,
            };
            if !penalized.insert(req.id) {
                continue;
            }
            let shortfall = req_years - best_years;
            let amount = (shortfall * config.penalty_experience_shortfall)
                .min(config.penalty_experience_shortfall * 3.0);
            penalties += amount;
            details.push(json!({
                "type": "experience_years_mismatch",
                "amount": amount,
                "reason": format!(
                    "Best experience section has {} years, requires {}",
                    best_years, req_years
                ),
                "requirement_text": req.text,
            }));
        }
    }

    (penalties, details)
}

/// Fit score: `clamp(0, 100, 100 * blended - penalties)` where
/// `blended = w_req*required + w_pref*preferred + w_sim*job_similarity`
pub fn calculate_fit_score(
    job_similarity: f64,
    required_coverage: f64,
    preferred_coverage: f64,
    fit_penalties: f64,
    config: &ScorerConfig,
) -> (f64, f64) {
    let blended = config.weight_required * required_coverage
        + config.weight_preferred * preferred_coverage
        + config.job_similarity_weight * job_similarity;
    let raw = 100.0 * blended - fit_penalties;
    (raw.clamp(0.0, 100.0), blended)
}

/// Want score from the want/facet similarity matrix.
///
/// Rows are normalized before the dot product (f32 math); cosine values map
/// from [-1, 1] to [0, 1]. Returns None when either side is empty.
pub fn calculate_want_score(
    user_want_embeddings: &[Vec<f32>],
    job_facet_embeddings: &HashMap<String, Vec<f32>>,
    facet_weights: &FacetWeights,
) -> Option<(f64, Value)> {
    if user_want_embeddings.is_empty() || job_facet_embeddings.is_empty() {
        return None;
    }

    // Stable facet order: the canonical keys first, then whatever else exists
    let mut facet_keys: Vec<&str> = crate::ai::types::FACET_KEYS
        .iter()
        .copied()
        .filter(|k| job_facet_embeddings.contains_key(*k))
        .collect();
    if facet_keys.is_empty() {
        facet_keys = job_facet_embeddings.keys().map(String::as_str).collect();
    }

    let normalized_wants: Vec<Vec<f32>> = user_want_embeddings
        .iter()
        .map(|v| row_normalized(v))
        .collect();
    let normalized_facets: Vec<Vec<f32>> = facet_keys
        .iter()
        .map(|k| row_normalized(&job_facet_embeddings[*k]))
        .collect();

    // Similarity matrix mapped to [0, 1]
    let mut matrix = vec![vec![0.0f32; facet_keys.len()]; normalized_wants.len()];
    for (i, want) in normalized_wants.iter().enumerate() {
        for (k, facet) in normalized_facets.iter().enumerate() {
            let dot: f32 = want
                .iter()
                .zip(facet.iter())
                .map(|(a, b)| a * b)
                .sum();
            matrix[i][k] = ((dot + 1.0) / 2.0).clamp(0.0, 1.0);
        }
    }

    let best_per_want: Vec<f32> = matrix
        .iter()
        .map(|row| row.iter().cloned().fold(0.0f32, f32::max))
        .collect();
    let aggregate_similarity =
        best_per_want.iter().sum::<f32>() as f64 / best_per_want.len() as f64;

    let facet_means: Vec<f64> = (0..facet_keys.len())
        .map(|k| {
            matrix.iter().map(|row| row[k] as f64).sum::<f64>() / matrix.len() as f64
        })
        .collect();

    let weights: Vec<f64> = facet_keys
        .iter()
        .map(|k| facet_weights.weight_for(k))
        .collect();
    let weight_sum: f64 = weights.iter().sum();

    let weighted_score = if weight_sum > 0.0 {
        facet_means
            .iter()
            .zip(weights.iter())
            .map(|(m, w)| m * w)
            .sum::<f64>()
            / weight_sum
    } else {
        aggregate_similarity
    };

    let want_score = (100.0 * weighted_score).min(100.0);

    let components = json!({
        "num_wants": normalized_wants.len(),
        "num_facets": facet_keys.len(),
        "want_scores": best_per_want,
        "aggregate_similarity": aggregate_similarity,
        "facet_weighted_score": weighted_score,
        "want_score": want_score,
    });

    Some((want_score, components))
}

fn row_normalized(vector: &[f32]) -> Vec<f32> {
    let mut copy = vector.to_vec();
    crate::vectors::normalize(&mut copy);
    copy
}

/// `overall = min(100, fit)` without a want score, otherwise
/// `min(100, fit_weight*fit + want_weight*want)`
pub fn blend_overall(config: &ScorerConfig, fit: f64, want: Option<f64>) -> f64 {
    match want {
        None => fit.min(100.0),
        Some(want) => (config.fit_weight * fit + config.want_weight * want).min(100.0),
    }
}

pub struct ScoringService {
    config: ScorerConfig,
}

impl ScoringService {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// Score one preliminary match.
    pub fn score_preliminary_match(
        &self,
        preliminary: &JobMatchPreliminary,
        best_experience_years: Option<f64>,
        user_want_embeddings: Option<&[Vec<f32>]>,
        job_facet_embeddings: Option<&HashMap<String, Vec<f32>>>,
        match_type: &str,
    ) -> ScoredJobMatch {
        let (required_coverage, preferred_coverage) = calculate_coverage(
            &preliminary.requirement_matches,
            &preliminary.missing_requirements,
        );

        let (fit_penalties, penalty_details) = calculate_fit_penalties(
            &preliminary.job,
            &preliminary.requirement_matches,
            &preliminary.missing_requirements,
            &self.config,
            best_experience_years,
        );

        let (fit_score, blended) = calculate_fit_score(
            preliminary.job_similarity,
            required_coverage,
            preferred_coverage,
            fit_penalties,
            &self.config,
        );

        let want = match (user_want_embeddings, job_facet_embeddings) {
            (Some(wants), Some(facets)) => {
                calculate_want_score(wants, facets, &self.config.facet_weights)
            }
            _ => None,
        };
        let want_score = want.as_ref().map(|(score, _)| *score);

        let overall_score = blend_overall(&self.config, fit_score, want_score);

        log::debug!(
            "Job {}: overall={:.1} fit={:.1} want={} req_cov={:.2} penalties={:.1}",
            preliminary.job.id,
            overall_score,
            fit_score,
            want_score.map_or("n/a".to_string(), |w| format!("{:.1}", w)),
            required_coverage,
            fit_penalties
        );

        ScoredJobMatch {
            job: preliminary.job.clone(),
            overall_score,
            fit_score,
            want_score,
            base_score: blended * 100.0,
            penalties: fit_penalties,
            penalty_details,
            required_coverage,
            preferred_coverage,
            job_similarity: preliminary.job_similarity,
            matched_requirements: preliminary.requirement_matches.clone(),
            missing_requirements: preliminary.missing_requirements.clone(),
            resume_fingerprint: preliminary.resume_fingerprint.clone(),
            match_type: match_type.to_string(),
        }
    }

    /// Score a batch of preliminary matches and apply the result policy:
    /// min-fit filter, optional required-coverage gate, sort by overall
    /// descending, truncate to top_k.
    pub fn score_matches(
        &self,
        conn: &Connection,
        preliminary_matches: &[JobMatchPreliminary],
        result_policy: &ResultPolicy,
        user_want_embeddings: Option<&[Vec<f32>]>,
        stop: &StopSignal,
    ) -> Result<Vec<ScoredJobMatch>, JobRadarError> {
        let repo = JobRepository::new(conn);

        // Prefetch per-resume experience years
        let mut years_by_fingerprint: HashMap<String, Option<f64>> = HashMap::new();
        for preliminary in preliminary_matches {
            if !years_by_fingerprint.contains_key(&preliminary.resume_fingerprint) {
                let years = repo.max_experience_years(&preliminary.resume_fingerprint)?;
                years_by_fingerprint.insert(preliminary.resume_fingerprint.clone(), years);
            }
        }

        let mut scored = Vec::with_capacity(preliminary_matches.len());
        for preliminary in preliminary_matches {
            if stop.is_set() {
                log::info!("Scoring interrupted");
                return Ok(Vec::new());
            }

            let facets = if user_want_embeddings.is_some() {
                Some(repo.get_facet_embeddings(preliminary.job.id)?)
            } else {
                None
            };

            scored.push(self.score_preliminary_match(
                preliminary,
                years_by_fingerprint
                    .get(&preliminary.resume_fingerprint)
                    .copied()
                    .flatten(),
                user_want_embeddings,
                facets.as_ref(),
                "requirements_only",
            ));
        }

        scored.sort_by(|a, b| {
            b.overall_score
                .partial_cmp(&a.overall_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if result_policy.min_fit > 0.0 {
            scored.retain(|m| m.fit_score >= result_policy.min_fit);
        }
        if let Some(min_coverage) = result_policy.min_jd_required_coverage {
            scored.retain(|m| m.required_coverage >= min_coverage);
        }
        scored.truncate(result_policy.top_k);

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockProvider;
    use crate::repository::JobRequirementUnit;

    fn job() -> JobPost {
        JobPost {
            id: 1,
            canonical_fingerprint: "fp".to_string(),
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            location_text: "Berlin".to_string(),
            is_remote: Some(true),
            description: Some("d".to_string()),
            skills_raw: None,
            raw_payload: None,
            content_hash: Some("hash".to_string()),
            first_seen_at: String::new(),
            last_seen_at: String::new(),
            is_extracted: true,
            is_embedded: true,
            summary_embedding: None,
            salary_min: None,
            salary_max: None,
            currency: None,
            job_level: None,
            min_years_experience: None,
            requires_degree: None,
            facet_status: "done".to_string(),
            facet_claimed_by: None,
            facet_claimed_at: None,
            facet_extraction_hash: None,
            facet_retry_count: 0,
            facet_last_error: None,
        }
    }

    fn requirement(id: i64, req_type: &str, text: &str, min_years: Option<f64>) -> JobRequirementUnit {
        JobRequirementUnit {
            id,
            job_post_id: 1,
            req_type: req_type.to_string(),
            text: text.to_string(),
            tags: None,
            ordinal: 0,
            min_years,
            years_context: None,
            embedding: None,
        }
    }

    fn covered(req: JobRequirementUnit, similarity: f64) -> RequirementMatchResult {
        RequirementMatchResult {
            requirement: req,
            evidence_text: Some("evidence".to_string()),
            evidence_section: Some("Experience".to_string()),
            similarity,
            is_covered: true,
        }
    }

    fn uncovered(req: JobRequirementUnit, similarity: f64) -> RequirementMatchResult {
        RequirementMatchResult {
            requirement: req,
            evidence_text: None,
            evidence_section: None,
            similarity,
            is_covered: false,
        }
    }

    fn preliminary(
        matched: Vec<RequirementMatchResult>,
        missing: Vec<RequirementMatchResult>,
        job_similarity: f64,
    ) -> JobMatchPreliminary {
        JobMatchPreliminary {
            job: job(),
            job_similarity,
            requirement_matches: matched,
            missing_requirements: missing,
            resume_fingerprint: "resume_fp".to_string(),
        }
    }

    #[test]
    fn full_coverage_no_penalties_scores_one_hundred() {
        // Job requires [Python, AWS], both covered, job_similarity = 1.0:
        // blended = 0.7*1 + 0.3*0 + 0.3*1 = 1.0, fit = 100
        let service = ScoringService::new(ScorerConfig::default());
        let prelim = preliminary(
            vec![
                covered(requirement(1, "required", "Python", None), 0.9),
                covered(requirement(2, "required", "AWS", None), 0.85),
            ],
            vec![],
            1.0,
        );

        let scored = service.score_preliminary_match(&prelim, None, None, None, "requirements_only");
        assert_eq!(scored.required_coverage, 1.0);
        assert_eq!(scored.preferred_coverage, 0.0);
        assert!((scored.fit_score - 100.0).abs() < 1e-9);
        assert!((scored.overall_score - 100.0).abs() < 1e-9);
        assert!(scored.penalty_details.is_empty());
    }

    #[test]
    fn missing_required_halves_coverage_and_penalizes() {
        // Coverage 0.5, one missing required:
        // blended = 0.7*0.5 + 0.3*1 = 0.65, fit = 100*0.65 - 15 = 50
        let service = ScoringService::new(ScorerConfig::default());
        let prelim = preliminary(
            vec![covered(requirement(1, "required", "Python", None), 0.9)],
            vec![uncovered(requirement(2, "required", "AWS", None), 0.2)],
            1.0,
        );

        let scored = service.score_preliminary_match(&prelim, None, None, None, "requirements_only");
        assert_eq!(scored.required_coverage, 0.5);
        assert!((scored.penalties - 15.0).abs() < 1e-9);
        assert!((scored.fit_score - 50.0).abs() < 1e-9);
        assert_eq!(scored.penalty_details[0]["type"], "missing_required");
    }

    #[test]
    fn want_only_scoring_blends_through_fit_weight() {
        // wants = ["remote", "python"], facets remote + tech populated.
        // No requirements at all -> fit = 0.3 * job_similarity contribution only.
        let service = ScoringService::new(ScorerConfig::default());
        let prelim = preliminary(vec![], vec![], 0.0);

        let wants = vec![
            MockProvider::mock_embedding("remote"),
            MockProvider::mock_embedding("python"),
        ];
        let mut facets = HashMap::new();
        facets.insert(
            "remote_flexibility".to_string(),
            MockProvider::mock_embedding("Fully remote"),
        );
        facets.insert(
            "tech_stack".to_string(),
            MockProvider::mock_embedding("Python, AWS"),
        );

        let scored = service.score_preliminary_match(
            &prelim,
            None,
            Some(&wants),
            Some(&facets),
            "requirements_only",
        );

        assert_eq!(scored.fit_score, 0.0);
        let want = scored.want_score.unwrap();
        assert!(want > 50.0, "want_score = {}", want);
        let expected_overall = (0.8 * 0.0 + 0.2 * want).min(100.0);
        assert!((scored.overall_score - expected_overall).abs() < 1e-9);
    }

    #[test]
    fn scores_stay_within_bounds() {
        let service = ScoringService::new(ScorerConfig::default());
        // Heavy penalties: many missing required
        let missing: Vec<RequirementMatchResult> = (0..20)
            .map(|i| uncovered(requirement(i, "required", "X", None), 0.0))
            .collect();
        let prelim = preliminary(vec![], missing, 0.0);

        let scored = service.score_preliminary_match(&prelim, None, None, None, "requirements_only");
        assert!((0.0..=100.0).contains(&scored.fit_score));
        assert!((0.0..=100.0).contains(&scored.overall_score));
        assert_eq!(scored.fit_score, 0.0);
    }

    #[test]
    fn undefined_want_means_overall_equals_fit() {
        let service = ScoringService::new(ScorerConfig::default());
        let prelim = preliminary(
            vec![covered(requirement(1, "required", "Python", None), 0.9)],
            vec![],
            0.4,
        );
        let scored = service.score_preliminary_match(&prelim, None, None, None, "requirements_only");
        assert!(scored.want_score.is_none());
        assert!((scored.overall_score - scored.fit_score).abs() < 1e-9);
    }

    #[test]
    fn defined_want_blends_with_weights() {
        let config = ScorerConfig::default();
        for (fit, want) in [(80.0, 40.0), (100.0, 100.0), (0.0, 95.0)] {
            let overall = blend_overall(&config, fit, Some(want));
            let expected = (config.fit_weight * fit + config.want_weight * want).min(100.0);
            assert!((overall - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn experience_shortfall_charged_once_per_requirement() {
        let config = ScorerConfig::default();
        // Requirement wants 6 years, best section has 2 -> shortfall 4,
        // capped at 3 * 15 = 45
        let matched = vec![covered(requirement(1, "required", "6+ years Python", Some(6.0)), 0.9)];
        let (penalties, details) =
            calculate_fit_penalties(&job(), &matched, &[], &config, Some(2.0));
        assert!((penalties - 45.0).abs() < 1e-9);
        let shortfall_entries = details
            .iter()
            .filter(|d| d["type"] == "experience_years_mismatch")
            .count();
        assert_eq!(shortfall_entries, 1);

        // Small shortfall is linear: 1 year * 15
        let matched = vec![covered(requirement(1, "required", "3+ years", Some(3.0)), 0.9)];
        let (penalties, _) = calculate_fit_penalties(&job(), &matched, &[], &config, Some(2.0));
        assert!((penalties - 15.0).abs() < 1e-9);

        // No experience sections -> no shortfall penalty
        let matched = vec![covered(requirement(1, "required", "3+ years", Some(3.0)), 0.9)];
        let (penalties, _) = calculate_fit_penalties(&job(), &matched, &[], &config, None);
        assert_eq!(penalties, 0.0);
    }

    #[test]
    fn seniority_and_compensation_penalties_apply() {
        let mut config = ScorerConfig::default();
        config.target_seniority = Some("junior".to_string());
        config.min_salary = Some(100000.0);

        let mut senior_job = job();
        senior_job.job_level = Some("Senior Engineer".to_string());
        senior_job.salary_max = Some(80000.0);

        let (penalties, details) =
            calculate_fit_penalties(&senior_job, &[], &[], &config, None);
        assert!((penalties - 20.0).abs() < 1e-9);
        let types: Vec<&str> = details
            .iter()
            .map(|d| d["type"].as_str().unwrap())
            .collect();
        assert!(types.contains(&"seniority_mismatch"));
        assert!(types.contains(&"compensation_mismatch"));
    }

    #[test]
    fn zero_weight_facets_fall_back_to_aggregate() {
        let weights = FacetWeights {
            remote_flexibility: 0.0,
            compensation: 0.0,
            learning_growth: 0.0,
            company_culture: 0.0,
            work_life_balance: 0.0,
            tech_stack: 0.0,
            visa_sponsorship: 0.0,
        };
        let wants = vec![MockProvider::mock_embedding("remote work")];
        let mut facets = HashMap::new();
        facets.insert(
            "remote_flexibility".to_string(),
            MockProvider::mock_embedding("fully remote"),
        );

        let (score, components) = calculate_want_score(&wants, &facets, &weights).unwrap();
        let aggregate = components["aggregate_similarity"].as_f64().unwrap();
        assert!((score - (100.0 * aggregate).min(100.0)).abs() < 1e-6);
    }

    #[test]
    fn want_score_requires_both_sides() {
        let weights = FacetWeights::default();
        assert!(calculate_want_score(&[], &HashMap::new(), &weights).is_none());

        let wants = vec![MockProvider::mock_embedding("remote")];
        assert!(calculate_want_score(&wants, &HashMap::new(), &weights).is_none());
    }

    #[test]
    fn policy_filters_sorts_and_truncates() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_database(&conn).unwrap();
        let service = ScoringService::new(ScorerConfig::default());

        // Three jobs with distinct coverage -> distinct fit scores
        let prelims = vec![
            preliminary(
                vec![covered(requirement(1, "required", "A", None), 0.9)],
                vec![],
                0.0,
            ),
            preliminary(vec![], vec![uncovered(requirement(2, "required", "B", None), 0.1)], 0.0),
            preliminary(
                vec![covered(requirement(3, "required", "C", None), 0.9)],
                vec![],
                1.0,
            ),
        ];

        let policy = ResultPolicy {
            min_fit: 30.0,
            top_k: 1,
            min_jd_required_coverage: Some(0.5),
        };
        let scored = service
            .score_matches(&conn, &prelims, &policy, None, &StopSignal::new())
            .unwrap();

        assert_eq!(scored.len(), 1);
        // The similarity-boosted full-coverage match wins
        assert_eq!(scored[0].job_similarity, 1.0);
    }
}
