//! Notification tracker queries (deduplication records)

use rusqlite::{params, OptionalExtension, Row};

use crate::errors::DatabaseError;
use crate::repository::models::NotificationTrackerRow;
use crate::repository::JobRepository;

/// Fields written when recording a dispatch attempt
#[derive(Debug, Clone)]
pub struct TrackerRecord {
    pub user_id: String,
    pub job_match_id: Option<i64>,
    pub event_type: String,
    pub channel_type: String,
    pub dedup_hash: String,
    pub content_hash: Option<String>,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub allow_resend: bool,
    pub resend_interval_hours: i64,
    pub sent_successfully: bool,
    pub error_message: Option<String>,
}

impl<'a> JobRepository<'a> {
    pub fn get_tracker_by_dedup_hash(
        &self,
        dedup_hash: &str,
    ) -> Result<Option<NotificationTrackerRow>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, job_match_id, event_type, channel_type, dedup_hash,
                    content_hash, recipient, subject, last_sent_at, send_count,
                    allow_resend, resend_interval_hours, sent_successfully, error_message
             FROM notification_tracker WHERE dedup_hash = ?",
        )?;
        Ok(stmt.query_row([dedup_hash], tracker_from_row).optional()?)
    }

    /// Upsert the tracker row by dedup hash: bump send_count and store the
    /// latest content hash, timestamp, and outcome.
    pub fn record_notification(&self, record: &TrackerRecord) -> Result<(), DatabaseError> {
        self.conn().execute(
            "INSERT INTO notification_tracker
                (user_id, job_match_id, event_type, channel_type, dedup_hash,
                 content_hash, recipient, subject, last_sent_at, send_count,
                 allow_resend, resend_interval_hours, sent_successfully, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11, ?12, ?13)
             ON CONFLICT (dedup_hash) DO UPDATE SET
                content_hash = excluded.content_hash,
                recipient = excluded.recipient,
                subject = excluded.subject,
                last_sent_at = excluded.last_sent_at,
                send_count = notification_tracker.send_count + 1,
                sent_successfully = excluded.sent_successfully,
                error_message = excluded.error_message",
            params![
                record.user_id,
                record.job_match_id,
                record.event_type,
                record.channel_type,
                record.dedup_hash,
                record.content_hash,
                record.recipient,
                record.subject,
                self.now(),
                record.allow_resend,
                record.resend_interval_hours,
                record.sent_successfully,
                record.error_message
            ],
        )?;
        Ok(())
    }
}

fn tracker_from_row(row: &Row) -> rusqlite::Result<NotificationTrackerRow> {
    Ok(NotificationTrackerRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        job_match_id: row.get(2)?,
        event_type: row.get(3)?,
        channel_type: row.get(4)?,
        dedup_hash: row.get(5)?,
        content_hash: row.get(6)?,
        recipient: row.get(7)?,
        subject: row.get(8)?,
        last_sent_at: row.get(9)?,
        send_count: row.get(10)?,
        allow_resend: row.get(11)?,
        resend_interval_hours: row.get(12)?,
        sent_successfully: row.get(13)?,
        error_message: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use rusqlite::Connection;

    fn record(dedup: &str, success: bool) -> TrackerRecord {
        TrackerRecord {
            user_id: "user1".to_string(),
            job_match_id: Some(1),
            event_type: "new_match".to_string(),
            channel_type: "email".to_string(),
            dedup_hash: dedup.to_string(),
            content_hash: Some("c1".to_string()),
            recipient: Some("user@example.com".to_string()),
            subject: Some("New match".to_string()),
            allow_resend: true,
            resend_interval_hours: 24,
            sent_successfully: success,
            error_message: if success { None } else { Some("boom".to_string()) },
        }
    }

    #[test]
    fn upsert_bumps_send_count() {
        let conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        let repo = JobRepository::new(&conn);

        repo.record_notification(&record("d1", true)).unwrap();
        repo.record_notification(&record("d1", false)).unwrap();

        let row = repo.get_tracker_by_dedup_hash("d1").unwrap().unwrap();
        assert_eq!(row.send_count, 2);
        assert!(!row.sent_successfully);
        assert_eq!(row.error_message.as_deref(), Some("boom"));

        assert!(repo.get_tracker_by_dedup_hash("other").unwrap().is_none());
    }
}
