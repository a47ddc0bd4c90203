//! Query helpers over the SQLite schema
//!
//! `JobRepository` borrows a connection (or a transaction, which derefs to
//! one) so every caller decides its own transaction boundary. The pipeline
//! opens one transaction per item; see the orchestrator.

pub mod jobs;
pub mod matches;
pub mod models;
pub mod notify;
pub mod resume;

use rusqlite::Connection;

pub use models::*;

pub struct JobRepository<'a> {
    conn: &'a Connection,
}

impl<'a> JobRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        self.conn
    }

    pub(crate) fn now(&self) -> String {
        chrono::Utc::now().to_rfc3339()
    }
}
