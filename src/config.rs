//! Application configuration
//!
//! Typed configuration structs loaded from YAML with environment-variable
//! overrides. Every recognized option has a serde default so a minimal config
//! file is enough to start; validation happens at load time so a bad config
//! fails the process before any work starts.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperSiteConfig {
    pub site_type: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default = "default_results_wanted")]
    pub results_wanted: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_old: Option<u32>,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

fn default_results_wanted() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

fn default_interval_seconds() -> u64 {
    3600
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpyConfig {
    pub url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_job_timeout")]
    pub job_timeout_seconds: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_poll_interval() -> u64 {
    10
}
fn default_job_timeout() -> u64 {
    300
}
fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub extraction_headers: Option<HashMap<String, String>>,
    #[serde(default = "default_extraction_model")]
    pub extraction_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
    #[serde(default)]
    pub extraction_temperature: f32,
    /// Separate endpoint for embeddings (falls back to base_url)
    #[serde(default)]
    pub embedding_base_url: Option<String>,
    #[serde(default)]
    pub embedding_api_key: Option<String>,
    #[serde(default)]
    pub embedding_headers: Option<HashMap<String, String>>,
}

fn default_extraction_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dimensions() -> usize {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResumeConfig {
    #[serde(default = "default_resume_file")]
    pub resume_file: String,
}

fn default_resume_file() -> String {
    "resume.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EtlConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub resume: ResumeConfig,
}

/// Post-scoring result filtering and truncation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPolicy {
    /// 0-100, fit score filter threshold
    #[serde(default)]
    pub min_fit: f64,
    /// Maximum results to return
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// 0-1, optional required-coverage gate
    #[serde(default)]
    pub min_jd_required_coverage: Option<f64>,
}

fn default_top_k() -> usize {
    100
}

impl Default for ResultPolicy {
    fn default() -> Self {
        Self {
            min_fit: 0.0,
            top_k: default_top_k(),
            min_jd_required_coverage: None,
        }
    }
}

/// Configuration for stage 1 (vector retrieval)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// None = default retrieval depth
    #[serde(default)]
    pub batch_size: Option<usize>,
}

fn default_similarity_threshold() -> f64 {
    0.5
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            batch_size: None,
        }
    }
}

/// Weights for each facet in the Want score calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetWeights {
    #[serde(default = "dw_remote")]
    pub remote_flexibility: f64,
    #[serde(default = "dw_comp")]
    pub compensation: f64,
    #[serde(default = "dw_learning")]
    pub learning_growth: f64,
    #[serde(default = "dw_culture")]
    pub company_culture: f64,
    #[serde(default = "dw_wlb")]
    pub work_life_balance: f64,
    #[serde(default = "dw_tech")]
    pub tech_stack: f64,
    #[serde(default = "dw_visa")]
    pub visa_sponsorship: f64,
}

fn dw_remote() -> f64 {
    0.15
}
fn dw_comp() -> f64 {
    0.20
}
fn dw_learning() -> f64 {
    0.15
}
fn dw_culture() -> f64 {
    0.15
}
fn dw_wlb() -> f64 {
    0.15
}
fn dw_tech() -> f64 {
    0.10
}
fn dw_visa() -> f64 {
    0.10
}

impl Default for FacetWeights {
    fn default() -> Self {
        Self {
            remote_flexibility: dw_remote(),
            compensation: dw_comp(),
            learning_growth: dw_learning(),
            company_culture: dw_culture(),
            work_life_balance: dw_wlb(),
            tech_stack: dw_tech(),
            visa_sponsorship: dw_visa(),
        }
    }
}

impl FacetWeights {
    /// Weight for a facet key; unknown keys weigh zero
    pub fn weight_for(&self, key: &str) -> f64 {
        match key {
            "remote_flexibility" => self.remote_flexibility,
            "compensation" => self.compensation,
            "learning_growth" => self.learning_growth,
            "company_culture" => self.company_culture,
            "work_life_balance" => self.work_life_balance,
            "tech_stack" => self.tech_stack,
            "visa_sponsorship" => self.visa_sponsorship,
            _ => 0.0,
        }
    }
}

/// Configuration for stage 2 (rule-based scoring)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    #[serde(default = "dw_required")]
    pub weight_required: f64,
    #[serde(default = "dw_preferred")]
    pub weight_preferred: f64,
    #[serde(default = "dw_job_similarity")]
    pub job_similarity_weight: f64,

    /// overall_score = fit_weight * fit_score + want_weight * want_score
    #[serde(default = "dw_fit")]
    pub fit_weight: f64,
    #[serde(default = "dw_want")]
    pub want_weight: f64,

    #[serde(default)]
    pub facet_weights: FacetWeights,

    // Capability penalties (used in the Fit score)
    #[serde(default = "dp_missing_required")]
    pub penalty_missing_required: f64,
    #[serde(default = "dp_seniority")]
    pub penalty_seniority_mismatch: f64,
    #[serde(default = "dp_compensation")]
    pub penalty_compensation_mismatch: f64,
    #[serde(default = "dp_experience")]
    pub penalty_experience_shortfall: f64,

    // User preferences applied as hard filters at retrieval time
    #[serde(default = "default_true")]
    pub wants_remote: bool,
    #[serde(default)]
    pub min_salary: Option<f64>,
    #[serde(default)]
    pub target_seniority: Option<String>,
}

fn dw_required() -> f64 {
    0.7
}
fn dw_preferred() -> f64 {
    0.3
}
fn dw_job_similarity() -> f64 {
    0.3
}
fn dw_fit() -> f64 {
    0.80
}
fn dw_want() -> f64 {
    0.20
}
fn dp_missing_required() -> f64 {
    15.0
}
fn dp_seniority() -> f64 {
    10.0
}
fn dp_compensation() -> f64 {
    10.0
}
fn dp_experience() -> f64 {
    15.0
}
fn default_true() -> bool {
    true
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            weight_required: dw_required(),
            weight_preferred: dw_preferred(),
            job_similarity_weight: dw_job_similarity(),
            fit_weight: dw_fit(),
            want_weight: dw_want(),
            facet_weights: FacetWeights::default(),
            penalty_missing_required: dp_missing_required(),
            penalty_seniority_mismatch: dp_seniority(),
            penalty_compensation_mismatch: dp_compensation(),
            penalty_experience_shortfall: dp_experience(),
            wants_remote: default_true(),
            min_salary: None,
            target_seniority: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Free-text file, one want per line, embedded independently
    #[serde(default)]
    pub user_wants_file: Option<String>,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub result_policy: ResultPolicy,
    #[serde(default = "default_true")]
    pub invalidate_on_job_change: bool,
    #[serde(default = "default_true")]
    pub invalidate_on_resume_change: bool,
    #[serde(default)]
    pub recalculate_existing: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_wants_file: None,
            matcher: MatcherConfig::default(),
            scorer: ScorerConfig::default(),
            result_policy: ResultPolicy::default(),
            invalidate_on_job_change: true,
            invalidate_on_resume_change: true,
            recalculate_existing: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationChannelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Email address, webhook URL, chat ID... depends on the channel
    #[serde(default)]
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Disabled by default - the user must opt in
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Base URL for links inside notifications
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Only notify for matches above this overall score
    #[serde(default = "default_min_score")]
    pub min_score_threshold: f64,
    #[serde(default = "default_true")]
    pub notify_on_new_match: bool,
    #[serde(default = "default_true")]
    pub notify_on_batch_complete: bool,
    #[serde(default)]
    pub channels: HashMap<String, NotificationChannelConfig>,
    #[serde(default = "default_true")]
    pub deduplication_enabled: bool,
    #[serde(default = "default_resend_interval")]
    pub resend_interval_hours: i64,
    #[serde(default = "default_true")]
    pub use_async_queue: bool,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_rate_limit_max_wait")]
    pub rate_limit_max_wait_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_min_score() -> f64 {
    70.0
}
fn default_resend_interval() -> i64 {
    24
}
fn default_rate_limit_max_wait() -> u64 {
    300
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            user_id: None,
            base_url: default_base_url(),
            min_score_threshold: default_min_score(),
            notify_on_new_match: true,
            notify_on_batch_complete: true,
            channels: HashMap::new(),
            deduplication_enabled: true,
            resend_interval_hours: default_resend_interval(),
            use_async_queue: true,
            redis_url: None,
            rate_limit_max_wait_seconds: default_rate_limit_max_wait(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jobspy: Option<JobSpyConfig>,
    #[serde(default)]
    pub etl: EtlConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub scrapers: Vec<ScraperSiteConfig>,
}

/// Environment variables checked in priority order for each config path
const ENV_MAPPINGS: &[(&[&str], &[&str])] = &[
    (&["DATABASE_URL"], &["database", "url"]),
    (&["JOBSPY_URL"], &["jobspy", "url"]),
    (
        &["ETL_LLM_EXTRACTION_BASE_URL", "ETL_LLM_BASE_URL"],
        &["etl", "llm", "base_url"],
    ),
    (
        &["ETL_LLM_EXTRACTION_API_KEY", "ETL_LLM_API_KEY"],
        &["etl", "llm", "api_key"],
    ),
    (&["ETL_EMBEDDING_BASE_URL"], &["etl", "llm", "embedding_base_url"]),
    (&["ETL_EMBEDDING_API_KEY"], &["etl", "llm", "embedding_api_key"]),
    (&["ETL_LLM_EXTRACTION_MODEL"], &["etl", "llm", "extraction_model"]),
    (&["ETL_EMBEDDING_MODEL"], &["etl", "llm", "embedding_model"]),
    (&["REDIS_URL"], &["notifications", "redis_url"]),
];

/// Header-map env vars: the env value is JSON mapping header names to the
/// names of other env vars holding the header values
const HEADER_MAPPINGS: &[(&str, &[&str])] = &[
    (
        "ETL_EXTRACTION_MODEL_HEADER_ENV_VARS",
        &["etl", "llm", "extraction_headers"],
    ),
    (
        "ETL_EMBEDDING_MODEL_HEADER_ENV_VARS",
        &["etl", "llm", "embedding_headers"],
    ),
];

fn set_nested(data: &mut serde_yaml::Value, keys: &[&str], value: serde_yaml::Value) {
    let mut cursor = data;
    for key in &keys[..keys.len() - 1] {
        if !cursor.is_mapping() {
            *cursor = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
        }
        let map = cursor.as_mapping_mut().expect("mapping ensured above");
        let entry_key = serde_yaml::Value::String(key.to_string());
        if !map.contains_key(&entry_key) {
            map.insert(
                entry_key.clone(),
                serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
            );
        }
        cursor = map.get_mut(&entry_key).expect("inserted above");
    }
    if !cursor.is_mapping() {
        *cursor = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
    }
    cursor.as_mapping_mut().expect("mapping ensured above").insert(
        serde_yaml::Value::String(keys[keys.len() - 1].to_string()),
        value,
    );
}

fn apply_env_overrides(data: &mut serde_yaml::Value) -> Result<(), ConfigurationError> {
    for (env_vars, keys) in ENV_MAPPINGS {
        let val = env_vars
            .iter()
            .find_map(|ev| std::env::var(ev).ok().filter(|v| !v.is_empty()));
        if let Some(val) = val {
            set_nested(data, keys, serde_yaml::Value::String(val));
        }
    }

    for (env_var, keys) in HEADER_MAPPINGS {
        if let Ok(env_val) = std::env::var(env_var) {
            if env_val.is_empty() {
                continue;
            }
            let header_map: HashMap<String, String> =
                serde_json::from_str(&env_val).map_err(|e| {
                    ConfigurationError::ParseError(format!("{} is not valid JSON: {}", env_var, e))
                })?;
            let mut resolved = serde_yaml::Mapping::new();
            for (header, value_env) in header_map {
                let value = std::env::var(&value_env).unwrap_or_default();
                resolved.insert(
                    serde_yaml::Value::String(header),
                    serde_yaml::Value::String(value),
                );
            }
            set_nested(data, keys, serde_yaml::Value::Mapping(resolved));
        }
    }

    Ok(())
}

/// Load the application config from a YAML file, then apply environment
/// overrides and validate into the typed structs.
pub fn load_config(config_path: &Path) -> Result<AppConfig, ConfigurationError> {
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| ConfigurationError::FileNotFound(format!("{}: {}", config_path.display(), e)))?;

    let mut data: serde_yaml::Value = serde_yaml::from_str(&raw)
        .map_err(|e| ConfigurationError::ParseError(e.to_string()))?;
    if data.is_null() {
        data = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
    }

    apply_env_overrides(&mut data)?;

    let config: AppConfig = serde_yaml::from_value(data)
        .map_err(|e| ConfigurationError::InvalidValue(e.to_string()))?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigurationError> {
    if config.database.url.is_empty() {
        return Err(ConfigurationError::MissingValue("database.url".to_string()));
    }
    if config.etl.llm.embedding_dimensions == 0 {
        return Err(ConfigurationError::InvalidValue(
            "etl.llm.embedding_dimensions must be positive".to_string(),
        ));
    }
    let s = &config.matching.scorer;
    for (name, value) in [
        ("weight_required", s.weight_required),
        ("weight_preferred", s.weight_preferred),
        ("fit_weight", s.fit_weight),
        ("want_weight", s.want_weight),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigurationError::InvalidValue(format!(
                "matching.scorer.{} must be in [0, 1], got {}",
                name, value
            )));
        }
    }
    if !(0.0..=1.0).contains(&config.matching.matcher.similarity_threshold) {
        return Err(ConfigurationError::InvalidValue(format!(
            "matching.matcher.similarity_threshold must be in [0, 1], got {}",
            config.matching.matcher.similarity_threshold
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let f = write_config("database:\n  url: sqlite://jobs.db\n");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.schedule.interval_seconds, 3600);
        assert_eq!(cfg.matching.matcher.similarity_threshold, 0.5);
        assert_eq!(cfg.matching.scorer.weight_required, 0.7);
        assert_eq!(cfg.matching.scorer.fit_weight, 0.80);
        assert_eq!(cfg.notifications.min_score_threshold, 70.0);
        assert!(!cfg.notifications.enabled);
        assert_eq!(cfg.etl.llm.embedding_dimensions, 1024);
    }

    #[test]
    fn facet_weights_sum_to_one_by_default() {
        let w = FacetWeights::default();
        let total = w.remote_flexibility
            + w.compensation
            + w.learning_growth
            + w.company_culture
            + w.work_life_balance
            + w.tech_stack
            + w.visa_sponsorship;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn env_override_wins_over_file() {
        let f = write_config("database:\n  url: from-file\n");
        std::env::set_var("DATABASE_URL", "from-env");
        let cfg = load_config(f.path()).unwrap();
        std::env::remove_var("DATABASE_URL");
        assert_eq!(cfg.database.url, "from-env");
    }

    #[test]
    fn out_of_range_weight_is_rejected() {
        let f = write_config(
            "database:\n  url: x\nmatching:\n  scorer:\n    fit_weight: 1.5\n",
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn header_env_vars_expand_into_maps() {
        let f = write_config("database:\n  url: x\n");
        std::env::set_var(
            "ETL_EXTRACTION_MODEL_HEADER_ENV_VARS",
            "{\"X-Api-Token\": \"MY_TOKEN_ENV\"}",
        );
        std::env::set_var("MY_TOKEN_ENV", "sekrit");
        let cfg = load_config(f.path()).unwrap();
        std::env::remove_var("ETL_EXTRACTION_MODEL_HEADER_ENV_VARS");
        std::env::remove_var("MY_TOKEN_ENV");
        let headers = cfg.etl.llm.extraction_headers.unwrap();
        assert_eq!(headers.get("X-Api-Token").map(String::as_str), Some("sekrit"));
    }
}
