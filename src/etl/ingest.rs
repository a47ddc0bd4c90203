//! Raw job ingest: normalize, fingerprint, deduplicate, upsert
//!
//! A content-hash change detected here is the authoritative trigger for
//! downstream facet re-extraction and match invalidation; both read the
//! stored hash rather than being told explicitly.

use serde_json::{json, Value};

use crate::errors::JobRadarError;
use crate::fingerprint::{job_content_hash, job_fingerprint, normalize_location};
use crate::repository::JobRepository;

/// What ingest did with one raw job
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Missing title or company; row skipped
    Skipped,
    /// New job row created
    Created { job_id: i64, content_changed: bool },
    /// Existing job row touched
    Updated { job_id: i64, content_changed: bool },
}

/// Ingest a single raw job from a scraper batch.
///
/// Call inside a per-item transaction.
pub fn ingest_one(
    repo: &JobRepository,
    raw_job: &Value,
    site_name: &str,
) -> Result<IngestOutcome, JobRadarError> {
    let title = raw_job.get("title").and_then(|v| v.as_str());
    let company = raw_job.get("company_name").and_then(|v| v.as_str());

    let (title, company) = match (title, company) {
        (Some(t), Some(c)) if !t.is_empty() && !c.is_empty() => (t, c),
        _ => {
            log::warn!("Skipping job with missing title or company");
            return Ok(IngestOutcome::Skipped);
        }
    };

    // 1. Fingerprint & normalization
    let location_text = normalize_location(raw_job.get("location"));
    let fingerprint = job_fingerprint(company, title, &location_text);

    // 2. Duplicate check
    let (job_id, created) = match repo.get_job_by_fingerprint(&fingerprint)? {
        Some(existing) => {
            log::info!("Duplicate found for {}. ID: {}", title, existing.id);
            repo.update_last_seen(existing.id)?;
            (existing.id, false)
        }
        None => {
            log::info!("New job found: {} at {}", title, company);
            let is_remote = raw_job.get("is_remote").and_then(|v| v.as_bool());
            let id =
                repo.create_job_post(title, company, &location_text, is_remote, &fingerprint)?;
            (id, true)
        }
    };

    // 3. Source row, unique per (site, url)
    repo.get_or_create_source(
        job_id,
        site_name,
        raw_job.get("job_url").and_then(|v| v.as_str()),
        raw_job.get("job_url_direct").and_then(|v| v.as_str()),
    )?;

    // 4. Content-hash change detection
    let description = raw_job.get("description").and_then(|v| v.as_str());
    let skills = raw_job.get("skills").cloned().unwrap_or_else(|| json!([]));
    let new_hash = job_content_hash(description.unwrap_or(""), &skills, title, company);

    let job = repo.get_job_by_id(job_id)?;
    let content_changed = job.content_hash.as_deref() != Some(new_hash.as_str());

    if job.description.is_none() || content_changed {
        let skills_raw = match &skills {
            Value::Array(items) if !items.is_empty() => Some(skills.to_string()),
            _ => None,
        };
        repo.update_job_content(
            job_id,
            description,
            skills_raw.as_deref(),
            raw_job,
            &new_hash,
        )?;
        if content_changed && job.content_hash.is_some() {
            log::debug!("Updated content hash for job {}: {}", job_id, &new_hash[..16]);
        }
    }

    Ok(if created {
        IngestOutcome::Created {
            job_id,
            content_changed,
        }
    } else {
        IngestOutcome::Updated {
            job_id,
            content_changed,
        }
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

    fn raw_job(description: &str) -> Value {
        json!({
            "title": "Backend Engineer",
            "company_name": "Acme",
            "location": {"city": "Berlin"},
            "is_remote": true,
            "job_url": "https://jobs.example/1",
            "description": description,
            "skills": ["python", "aws"]
        })
    }

    #[test]
    fn same_payload_twice_yields_one_row_and_updates_last_seen() {
        let conn = setup();
        let repo = JobRepository::new(&conn);

        let first = ingest_one(&repo, &raw_job("desc"), "indeed").unwrap();
        let job_id = match first {
            IngestOutcome::Created { job_id, .. } => job_id,
            other => panic!("expected Created, got {:?}", other),
        };

        let second = ingest_one(&repo, &raw_job("desc"), "indeed").unwrap();
        match second {
            IngestOutcome::Updated {
                job_id: second_id,
                content_changed,
            } => {
                assert_eq!(second_id, job_id);
                assert!(!content_changed);
            }
            other => panic!("expected Updated, got {:?}", other),
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM job_post", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn description_change_flips_content_hash() {
        let conn = setup();
        let repo = JobRepository::new(&conn);

        ingest_one(&repo, &raw_job("original"), "indeed").unwrap();
        let before = repo
            .get_job_by_fingerprint(&job_fingerprint("Acme", "Backend Engineer", "Berlin"))
            .unwrap()
            .unwrap();

        let outcome = ingest_one(&repo, &raw_job("rewritten"), "indeed").unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::Updated {
                content_changed: true,
                ..
            }
        ));

        let after = repo.get_job_by_id(before.id).unwrap();
        assert_ne!(before.content_hash, after.content_hash);
        assert_eq!(after.description.as_deref(), Some("rewritten"));
    }

    #[test]
    fn missing_company_is_skipped() {
        let conn = setup();
        let repo = JobRepository::new(&conn);
        let raw = json!({"title": "Engineer"});
        assert_eq!(
            ingest_one(&repo, &raw, "indeed").unwrap(),
            IngestOutcome::Skipped
        );
    }

    #[test]
    fn sources_accumulate_per_site() {
        let conn = setup();
        let repo = JobRepository::new(&conn);

        ingest_one(&repo, &raw_job("d"), "indeed").unwrap();
        let mut other = raw_job("d");
        other["job_url"] = json!("https://jobs.example/other");
        ingest_one(&repo, &other, "linkedin").unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM job_post_source", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
