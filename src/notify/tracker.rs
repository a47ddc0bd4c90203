//! Notification deduplication tracker
//!
//! Dedup hashes group notifications about the same (user, match, event,
//! channel) tuple; the strategy decides whether a resend is allowed based on
//! content changes and the resend interval.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::DatabaseError;
use crate::fingerprint::canonical_json;
use crate::repository::notify::TrackerRecord;
use crate::repository::{JobRepository, NotificationTrackerRow};

/// Effectively never
const RESEND_INTERVAL_NEVER: i64 = 999_999;

/// Event types that may be resent after the interval elapses
const RESENDABLE_EVENTS: [&str; 2] = ["score_improved", "status_changed"];

/// A notification event considered for deduplication
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub user_id: String,
    pub job_match_id: Option<i64>,
    pub event_type: String,
    pub channel_type: String,
    pub content_hash: String,
}

/// Strategy deciding whether a notification may be (re)sent
pub trait DeduplicationStrategy: Send + Sync {
    fn should_allow(
        &self,
        existing: Option<&NotificationTrackerRow>,
        event: &NotificationEvent,
    ) -> bool;

    /// Minimum hours between resends recorded on new tracker rows
    fn resend_interval_hours(&self) -> i64;
}

/// Default strategy:
/// - never sent before: allow
/// - content changed: allow
/// - event type not resendable: block
/// - resend interval not yet elapsed: block
/// - otherwise allow
pub struct DefaultDeduplicationStrategy {
    pub default_interval_hours: i64,
}

impl DefaultDeduplicationStrategy {
    pub fn new(default_interval_hours: i64) -> Self {
        Self {
            default_interval_hours,
        }
    }
}

impl Default for DefaultDeduplicationStrategy {
    fn default() -> Self {
        Self::new(24)
    }
}

impl DeduplicationStrategy for DefaultDeduplicationStrategy {
    fn should_allow(
        &self,
        existing: Option<&NotificationTrackerRow>,
        event: &NotificationEvent,
    ) -> bool {
        let existing = match existing {
            Some(row) => row,
            None => return true,
        };

        if let Some(stored_hash) = &existing.content_hash {
            if !stored_hash.is_empty() && stored_hash != &event.content_hash {
                log::info!("Content changed, allowing resend");
                return true;
            }
        }

        if !RESENDABLE_EVENTS.contains(&event.event_type.as_str()) {
            log::info!("Event type {} does not allow resends", event.event_type);
            return false;
        }

        if !existing.allow_resend {
            return false;
        }

        let interval_hours = if existing.resend_interval_hours > 0 {
            existing.resend_interval_hours
        } else {
            self.default_interval_hours
        };
        let last_sent = DateTime::parse_from_rfc3339(&existing.last_sent_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        if Utc::now() - last_sent < Duration::hours(interval_hours) {
            log::info!("Too soon to resend (last sent {})", existing.last_sent_at);
            return false;
        }

        true
    }

    fn resend_interval_hours(&self) -> i64 {
        self.default_interval_hours
    }
}

/// Aggressive strategy: only ever notify once per dedup hash
pub struct AggressiveDeduplicationStrategy;

impl DeduplicationStrategy for AggressiveDeduplicationStrategy {
    fn should_allow(
        &self,
        existing: Option<&NotificationTrackerRow>,
        _event: &NotificationEvent,
    ) -> bool {
        existing.is_none()
    }

    fn resend_interval_hours(&self) -> i64 {
        RESEND_INTERVAL_NEVER
    }
}

/// Deduplication hash: identifies the (user, match, event, channel) tuple
pub fn generate_dedup_hash(
    user_id: &str,
    job_match_id: Option<i64>,
    event_type: &str,
    channel_type: &str,
) -> String {
    let match_part = job_match_id.map_or("None".to_string(), |id| id.to_string());
    let key = format!("{}:{}:{}:{}", user_id, match_part, event_type, channel_type);
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)[..32].to_string()
}

/// Content hash over subject, body prefix, and metadata
pub fn generate_content_hash(subject: &str, body: &str, metadata: Option<&Value>) -> String {
    let body_prefix: String = body.chars().take(500).collect();
    let content = serde_json::json!({
        "subject": subject,
        "body": body_prefix,
        "metadata": metadata.map(canonical_json),
    });
    let digest = Sha256::digest(canonical_json(&content).as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

/// Tracker service: dedup checks and send records over the repository
pub struct NotificationTrackerService {
    strategy: Box<dyn DeduplicationStrategy>,
}

impl NotificationTrackerService {
    pub fn new(strategy: Box<dyn DeduplicationStrategy>) -> Self {
        Self { strategy }
    }

    /// Should this notification go out, or is it a duplicate?
    pub fn should_send(
        &self,
        repo: &JobRepository,
        user_id: &str,
        job_match_id: Option<i64>,
        event_type: &str,
        channel_type: &str,
        subject: &str,
        body: &str,
        metadata: Option<&Value>,
    ) -> Result<bool, DatabaseError> {
        let dedup_hash = generate_dedup_hash(user_id, job_match_id, event_type, channel_type);
        let existing = repo.get_tracker_by_dedup_hash(&dedup_hash)?;

        if existing.is_none() {
            log::debug!("No previous notification for hash {}", dedup_hash);
            return Ok(true);
        }

        let event = NotificationEvent {
            user_id: user_id.to_string(),
            job_match_id,
            event_type: event_type.to_string(),
            channel_type: channel_type.to_string(),
            content_hash: generate_content_hash(subject, body, metadata),
        };

        let allowed = self.strategy.should_allow(existing.as_ref(), &event);
        if !allowed {
            log::info!(
                "Suppressing duplicate notification: {} for {} via {}",
                event_type,
                user_id,
                channel_type
            );
        }
        Ok(allowed)
    }

    /// Record a dispatch attempt (success or terminal failure)
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        repo: &JobRepository,
        user_id: &str,
        job_match_id: Option<i64>,
        event_type: &str,
        channel_type: &str,
        recipient: &str,
        subject: &str,
        body: &str,
        metadata: Option<&Value>,
        success: bool,
        error_message: Option<&str>,
        allow_resend: bool,
    ) -> Result<(), DatabaseError> {
        let record = TrackerRecord {
            user_id: user_id.to_string(),
            job_match_id,
            event_type: event_type.to_string(),
            channel_type: channel_type.to_string(),
            dedup_hash: generate_dedup_hash(user_id, job_match_id, event_type, channel_type),
            content_hash: Some(generate_content_hash(subject, body, metadata)),
            recipient: Some(recipient.to_string()),
            subject: Some(subject.to_string()),
            allow_resend,
            resend_interval_hours: self.strategy.resend_interval_hours(),
            sent_successfully: success,
            error_message: error_message.map(str::to_string),
        };
        repo.record_notification(&record)
    }
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

    fn service() -> NotificationTrackerService {
        NotificationTrackerService::new(Box::new(DefaultDeduplicationStrategy::default()))
    }

    #[test]
    fn dedup_hash_is_stable_and_distinguishes_channels() {
        let a = generate_dedup_hash("u1", Some(5), "new_match", "email");
        let b = generate_dedup_hash("u1", Some(5), "new_match", "email");
        let c = generate_dedup_hash("u1", Some(5), "new_match", "telegram");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn first_send_is_allowed_then_same_content_is_suppressed() {
        let conn = setup();
        let repo = JobRepository::new(&conn);
        let tracker = service();

        assert!(tracker
            .should_send(&repo, "u1", Some(1), "new_match", "email", "S", "B", None)
            .unwrap());

        tracker
            .record(
                &repo, "u1", Some(1), "new_match", "email", "u@x.com", "S", "B", None, true,
                None, true,
            )
            .unwrap();

        assert!(!tracker
            .should_send(&repo, "u1", Some(1), "new_match", "email", "S", "B", None)
            .unwrap());
    }

    #[test]
    fn content_change_reopens_the_gate() {
        let conn = setup();
        let repo = JobRepository::new(&conn);
        let tracker = service();

        tracker
            .record(
                &repo, "u1", Some(1), "new_match", "email", "u@x.com", "S", "B", None, true,
                None, true,
            )
            .unwrap();

        assert!(tracker
            .should_send(
                &repo,
                "u1",
                Some(1),
                "new_match",
                "email",
                "S updated",
                "B",
                None
            )
            .unwrap());
    }

    #[test]
    fn resendable_event_waits_for_interval() {
        let conn = setup();
        let repo = JobRepository::new(&conn);
        let tracker = service();

        tracker
            .record(
                &repo,
                "u1",
                Some(1),
                "score_improved",
                "email",
                "u@x.com",
                "S",
                "B",
                None,
                true,
                None,
                true,
            )
            .unwrap();

        // Identical content immediately after: interval blocks
        assert!(!tracker
            .should_send(&repo, "u1", Some(1), "score_improved", "email", "S", "B", None)
            .unwrap());

        // Backdate the last send beyond the interval
        conn.execute(
            "UPDATE notification_tracker SET last_sent_at = ?",
            [(Utc::now() - Duration::hours(25)).to_rfc3339()],
        )
        .unwrap();
        assert!(tracker
            .should_send(&repo, "u1", Some(1), "score_improved", "email", "S", "B", None)
            .unwrap());
    }

    #[test]
    fn aggressive_strategy_blocks_all_resends() {
        let conn = setup();
        let repo = JobRepository::new(&conn);
        let tracker =
            NotificationTrackerService::new(Box::new(AggressiveDeduplicationStrategy));

        tracker
            .record(
                &repo,
                "u1",
                Some(1),
                "score_improved",
                "email",
                "u@x.com",
                "S",
                "B",
                None,
                true,
                None,
                true,
            )
            .unwrap();

        // Even changed content stays blocked
        assert!(!tracker
            .should_send(
                &repo,
                "u1",
                Some(1),
                "score_improved",
                "email",
                "New subject",
                "B",
                None
            )
            .unwrap());
    }

    #[test]
    fn content_hash_ignores_metadata_key_order() {
        let a = generate_content_hash(
            "S",
            "B",
            Some(&serde_json::json!({"x": 1, "y": 2})),
        );
        let b = generate_content_hash(
            "S",
            "B",
            Some(&serde_json::json!({"y": 2, "x": 1})),
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
