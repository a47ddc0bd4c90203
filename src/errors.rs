//! Unified error types for JobRadar
//!
//! This module provides standardized error types across all modules,
//! ensuring consistent error handling and better error messages.

use std::fmt;

pub use crate::ai::errors::AiProviderError;

/// Main error type for the application
///
/// This enum represents all possible errors that can occur in JobRadar.
/// It implements `std::error::Error` for proper error handling and can be
/// converted to user-friendly messages.
#[derive(Debug, Clone)]
pub enum JobRadarError {
    /// Database-related errors
    Database(DatabaseError),
    /// AI provider errors
    AiProvider(AiProviderError),
    /// Scraper service errors
    Scraper(ScraperError),
    /// Notification dispatch errors
    Notification(NotificationError),
    /// Validation errors
    Validation(ValidationError),
    /// Configuration errors
    Configuration(ConfigurationError),
    /// General application errors
    Application(String),
}

/// Database-specific errors
#[derive(Debug, Clone)]
pub enum DatabaseError {
    /// Connection failed
    ConnectionFailed(String),
    /// Query execution failed
    QueryFailed(String),
    /// Migration failed
    MigrationFailed(String),
    /// Constraint violation (e.g., unique constraint)
    ConstraintViolation(String),
    /// Record not found
    NotFound(String),
    /// Invalid data format
    InvalidData(String),
}

/// Errors from the external scraper task-queue service
#[derive(Debug, Clone)]
pub enum ScraperError {
    /// Request could not be sent (connection, timeout)
    NetworkError(String),
    /// 4xx response - caller error, not retryable
    ClientError(u16, String),
    /// 5xx response - retryable
    ServerError(u16, String),
    /// Task reported failure by the service
    TaskFailed(String),
    /// Task did not complete within the configured timeout
    Timeout(String),
    /// Polling cancelled by the stop signal
    Cancelled,
}

/// Notification dispatch errors
#[derive(Debug, Clone)]
pub enum NotificationError {
    /// Channel is not configured (missing credentials etc.)
    NotConfigured(String),
    /// Unknown channel key requested from the factory
    UnknownChannel(String),
    /// Channel reported a rate limit; carries retry-after seconds if known
    RateLimited(Option<u64>),
    /// Transient send failure (network, 5xx)
    SendFailed(String),
    /// Recipient or payload rejected by a security guard
    Rejected(String),
    /// Queue backend unavailable
    QueueUnavailable(String),
}

/// Validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Required field is missing
    MissingField(String),
    /// Field has invalid format
    InvalidFormat(String),
    /// Field value is out of range
    OutOfRange(String),
    /// General validation error
    General(String),
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigurationError {
    /// Configuration file not found
    FileNotFound(String),
    /// Failed to parse configuration
    ParseError(String),
    /// Invalid setting value
    InvalidValue(String),
    /// Required setting missing
    MissingValue(String),
}

impl fmt::Display for JobRadarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobRadarError::Database(e) => write!(f, "Database error: {}", e),
            JobRadarError::AiProvider(e) => write!(f, "AI error: {}", e),
            JobRadarError::Scraper(e) => write!(f, "Scraper error: {}", e),
            JobRadarError::Notification(e) => write!(f, "Notification error: {}", e),
            JobRadarError::Validation(e) => write!(f, "Validation error: {}", e),
            JobRadarError::Configuration(e) => write!(f, "Configuration error: {}", e),
            JobRadarError::Application(msg) => write!(f, "Application error: {}", msg),
        }
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            DatabaseError::QueryFailed(msg) => write!(f, "Query failed: {}", msg),
            DatabaseError::MigrationFailed(msg) => write!(f, "Migration failed: {}", msg),
            DatabaseError::ConstraintViolation(msg) => write!(f, "Constraint violation: {}", msg),
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
        }
    }
}

impl fmt::Display for ScraperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScraperError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ScraperError::ClientError(code, msg) => write!(f, "Client error {}: {}", code, msg),
            ScraperError::ServerError(code, msg) => write!(f, "Server error {}: {}", code, msg),
            ScraperError::TaskFailed(msg) => write!(f, "Task failed: {}", msg),
            ScraperError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            ScraperError::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationError::NotConfigured(msg) => write!(f, "Channel not configured: {}", msg),
            NotificationError::UnknownChannel(key) => write!(f, "Unknown channel type: {}", key),
            NotificationError::RateLimited(Some(secs)) => {
                write!(f, "Rate limited (retry after {}s)", secs)
            }
            NotificationError::RateLimited(None) => write!(f, "Rate limited"),
            NotificationError::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            NotificationError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            NotificationError::QueueUnavailable(msg) => write!(f, "Queue unavailable: {}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField(msg) => write!(f, "Missing field: {}", msg),
            ValidationError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            ValidationError::OutOfRange(msg) => write!(f, "Out of range: {}", msg),
            ValidationError::General(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::FileNotFound(msg) => write!(f, "File not found: {}", msg),
            ConfigurationError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigurationError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            ConfigurationError::MissingValue(msg) => write!(f, "Missing value: {}", msg),
        }
    }
}

impl std::error::Error for JobRadarError {}
impl std::error::Error for DatabaseError {}
impl std::error::Error for ScraperError {}
impl std::error::Error for NotificationError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for ConfigurationError {}

impl From<DatabaseError> for JobRadarError {
    fn from(e: DatabaseError) -> Self {
        JobRadarError::Database(e)
    }
}

impl From<AiProviderError> for JobRadarError {
    fn from(e: AiProviderError) -> Self {
        JobRadarError::AiProvider(e)
    }
}

impl From<ScraperError> for JobRadarError {
    fn from(e: ScraperError) -> Self {
        JobRadarError::Scraper(e)
    }
}

impl From<NotificationError> for JobRadarError {
    fn from(e: NotificationError) -> Self {
        JobRadarError::Notification(e)
    }
}

impl From<ValidationError> for JobRadarError {
    fn from(e: ValidationError) -> Self {
        JobRadarError::Validation(e)
    }
}

impl From<ConfigurationError> for JobRadarError {
    fn from(e: ConfigurationError) -> Self {
        JobRadarError::Configuration(e)
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound(e.to_string()),
            rusqlite::Error::SqliteFailure(inner, _)
                if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DatabaseError::ConstraintViolation(e.to_string())
            }
            _ => DatabaseError::QueryFailed(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for JobRadarError {
    fn from(e: rusqlite::Error) -> Self {
        JobRadarError::Database(DatabaseError::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_carry_context() {
        let err = JobRadarError::Database(DatabaseError::NotFound("job 42".to_string()));
        assert!(err.to_string().contains("job 42"));

        let err = JobRadarError::Scraper(ScraperError::ClientError(422, "bad config".to_string()));
        assert!(err.to_string().contains("422"));
    }

    #[test]
    fn rusqlite_no_rows_maps_to_not_found() {
        let err: DatabaseError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }
}
