//! Database bootstrap: app data dir, connections, and schema migrations
//!
//! The schema is applied through numbered migrations recorded in a
//! `migrations` table, so re-running init on an existing database is a no-op.

use rusqlite::{Connection, Result};
use std::path::{Path, PathBuf};

/// Get the app data directory (where the database and logs are stored)
///
/// In development this is `.jobradar` in the current directory.
pub fn get_app_data_dir() -> PathBuf {
    let app_data_dir = std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".jobradar");
    std::fs::create_dir_all(&app_data_dir).expect("Failed to create app data directory");
    app_data_dir
}

/// Resolve a `database.url` config value into a filesystem path.
///
/// Accepts `sqlite://path`, `sqlite:path`, or a bare path. The special value
/// `:memory:` opens an in-memory database (useful for tests).
pub fn database_path_from_url(url: &str) -> PathBuf {
    let trimmed = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(trimmed)
}

/// Open a connection to the database at the given path.
///
/// Every connection gets a busy timeout and foreign keys enabled so that
/// concurrent workers queue on the writer lock instead of failing fast.
pub fn open_connection(db_path: &Path) -> Result<Connection> {
    let conn = if db_path.as_os_str() == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(db_path)?
    };
    conn.busy_timeout(std::time::Duration::from_secs(30))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Initialize the database: create the migrations table and apply pending
/// migrations.
pub fn init_database(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    run_migrations(conn)?;

    Ok(())
}

fn migration_applied(conn: &Connection, name: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM migrations WHERE name = ?")?;
    let count: i64 = stmt.query_row([name], |row| row.get(0))?;
    Ok(count > 0)
}

fn record_migration(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO migrations (name, applied_at) VALUES (?, datetime('now'))",
        [name],
    )?;
    Ok(())
}

fn run_migrations(conn: &Connection) -> Result<()> {
    let migrations: &[(&str, fn(&Connection) -> Result<()>)] = &[
        ("001_jobs", migration_001_jobs),
        ("002_requirements", migration_002_requirements),
        ("003_facets", migration_003_facets),
        ("004_resume", migration_004_resume),
        ("005_matches", migration_005_matches),
        ("006_notification_tracker", migration_006_notification_tracker),
        ("007_indexes", migration_007_indexes),
    ];

    for (name, migration) in migrations {
        if !migration_applied(conn, name)? {
            log::info!("Running migration: {}", name);
            migration(conn)?;
            record_migration(conn, name)?;
        }
    }

    Ok(())
}

pub fn migration_001_jobs(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS job_post (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            canonical_fingerprint TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            company TEXT NOT NULL,
            location_text TEXT NOT NULL DEFAULT 'Unknown',
            is_remote INTEGER,
            description TEXT,
            skills_raw TEXT,
            raw_payload TEXT,
            content_hash TEXT,
            first_seen_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            is_extracted INTEGER NOT NULL DEFAULT 0,
            is_embedded INTEGER NOT NULL DEFAULT 0,
            summary_embedding BLOB,
            salary_min REAL,
            salary_max REAL,
            currency TEXT,
            job_level TEXT,
            min_years_experience REAL,
            requires_degree INTEGER,
            facet_status TEXT NOT NULL DEFAULT 'pending',
            facet_claimed_by TEXT,
            facet_claimed_at TEXT,
            facet_extraction_hash TEXT,
            facet_retry_count INTEGER NOT NULL DEFAULT 0,
            facet_last_error TEXT
        );

        CREATE TABLE IF NOT EXISTS job_post_source (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_post_id INTEGER NOT NULL REFERENCES job_post(id),
            site TEXT NOT NULL,
            job_url TEXT,
            job_url_direct TEXT,
            UNIQUE (site, job_url)
        );",
    )
}

pub fn migration_002_requirements(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS job_requirement_unit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_post_id INTEGER NOT NULL REFERENCES job_post(id),
            req_type TEXT NOT NULL,
            text TEXT NOT NULL,
            tags TEXT,
            ordinal INTEGER NOT NULL DEFAULT 0,
            min_years REAL,
            years_context TEXT
        );

        CREATE TABLE IF NOT EXISTS job_requirement_embedding (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_requirement_unit_id INTEGER NOT NULL UNIQUE
                REFERENCES job_requirement_unit(id),
            embedding BLOB NOT NULL
        );

        CREATE TABLE IF NOT EXISTS job_benefit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_post_id INTEGER NOT NULL REFERENCES job_post(id),
            category TEXT NOT NULL DEFAULT 'other',
            text TEXT NOT NULL,
            ordinal INTEGER NOT NULL DEFAULT 0
        );",
    )
}

pub fn migration_003_facets(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS job_facet_embedding (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_post_id INTEGER NOT NULL REFERENCES job_post(id),
            facet_key TEXT NOT NULL,
            facet_text TEXT NOT NULL,
            embedding BLOB,
            content_hash TEXT NOT NULL DEFAULT '',
            UNIQUE (job_post_id, facet_key)
        );",
    )
}

pub fn migration_004_resume(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS structured_resume (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resume_fingerprint TEXT NOT NULL UNIQUE,
            profile TEXT NOT NULL,
            total_experience_years REAL,
            extraction_confidence REAL,
            extraction_warnings TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS resume_section_embedding (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resume_fingerprint TEXT NOT NULL,
            section_type TEXT NOT NULL,
            section_index INTEGER NOT NULL DEFAULT 0,
            source_text TEXT NOT NULL,
            source_data TEXT,
            embedding BLOB NOT NULL
        );

        CREATE TABLE IF NOT EXISTS resume_evidence_embedding (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resume_fingerprint TEXT NOT NULL,
            evidence_unit_id TEXT NOT NULL,
            source_text TEXT NOT NULL,
            source_section TEXT NOT NULL,
            tags TEXT,
            embedding BLOB NOT NULL,
            years_value REAL,
            years_context TEXT,
            is_total_years_claim INTEGER NOT NULL DEFAULT 0
        );",
    )
}

pub fn migration_005_matches(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS job_match (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_post_id INTEGER NOT NULL REFERENCES job_post(id),
            resume_fingerprint TEXT NOT NULL,
            job_content_hash TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            overall_score REAL NOT NULL DEFAULT 0,
            fit_score REAL NOT NULL DEFAULT 0,
            want_score REAL NOT NULL DEFAULT 0,
            base_score REAL NOT NULL DEFAULT 0,
            penalties REAL NOT NULL DEFAULT 0,
            penalty_details TEXT,
            required_coverage REAL NOT NULL DEFAULT 0,
            preferred_coverage REAL NOT NULL DEFAULT 0,
            job_similarity REAL NOT NULL DEFAULT 0,
            match_type TEXT NOT NULL DEFAULT 'requirements_only',
            notified INTEGER NOT NULL DEFAULT 0,
            calculated_at TEXT NOT NULL,
            invalidated_reason TEXT
        );

        CREATE TABLE IF NOT EXISTS job_match_requirement (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_match_id INTEGER NOT NULL REFERENCES job_match(id),
            job_requirement_unit_id INTEGER NOT NULL
                REFERENCES job_requirement_unit(id),
            evidence_text TEXT NOT NULL DEFAULT '',
            evidence_section TEXT,
            similarity_score REAL NOT NULL DEFAULT 0,
            is_covered INTEGER NOT NULL DEFAULT 0,
            req_type TEXT NOT NULL
        );",
    )
}

pub fn migration_006_notification_tracker(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS notification_tracker (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            job_match_id INTEGER,
            event_type TEXT NOT NULL,
            channel_type TEXT NOT NULL,
            dedup_hash TEXT NOT NULL UNIQUE,
            content_hash TEXT,
            recipient TEXT,
            subject TEXT,
            last_sent_at TEXT NOT NULL,
            send_count INTEGER NOT NULL DEFAULT 1,
            allow_resend INTEGER NOT NULL DEFAULT 1,
            resend_interval_hours INTEGER NOT NULL DEFAULT 24,
            sent_successfully INTEGER NOT NULL DEFAULT 0,
            error_message TEXT
        );",
    )
}

pub fn migration_007_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_job_post_fingerprint
            ON job_post(canonical_fingerprint);
        CREATE INDEX IF NOT EXISTS idx_job_post_facet_status
            ON job_post(facet_status);
        CREATE INDEX IF NOT EXISTS idx_requirement_job
            ON job_requirement_unit(job_post_id);
        CREATE INDEX IF NOT EXISTS idx_facet_job
            ON job_facet_embedding(job_post_id);
        CREATE INDEX IF NOT EXISTS idx_match_job_resume
            ON job_match(job_post_id, resume_fingerprint);
        CREATE INDEX IF NOT EXISTS idx_match_status
            ON job_match(status);
        CREATE INDEX IF NOT EXISTS idx_evidence_fingerprint
            ON resume_evidence_embedding(resume_fingerprint);
        CREATE INDEX IF NOT EXISTS idx_section_fingerprint
            ON resume_section_embedding(resume_fingerprint);",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        init_database(&conn).unwrap();

        let count: i64 = conn
            .prepare("SELECT COUNT(*) FROM migrations")
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 7);
    }

    #[test]
    fn database_url_forms_resolve() {
        assert_eq!(
            database_path_from_url("sqlite://jobs.db"),
            PathBuf::from("jobs.db")
        );
        assert_eq!(
            database_path_from_url("sqlite::memory:"),
            PathBuf::from(":memory:")
        );
        assert_eq!(database_path_from_url("jobs.db"), PathBuf::from("jobs.db"));
    }
}
