//! JobRadar: a personalized job-matching pipeline
//!
//! Ingests scraped job postings, extracts structured requirements and
//! semantic facets with an LLM, embeds jobs and a structured resume into a
//! common vector space, scores Fit/Want matches, and dispatches deduplicated
//! notifications.

pub mod ai;
pub mod config;
pub mod db;
pub mod errors;
pub mod etl;
pub mod fingerprint;
pub mod logging;
pub mod matching;
pub mod notify;
pub mod orchestrator;
pub mod repository;
pub mod scraper;
pub mod vectors;
