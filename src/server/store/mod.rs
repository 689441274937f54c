//! The job store: the shared SQL schema and every operation that mutates it.
//!
//! Every public method here is either a single atomic SQL statement or a short transaction
//! whose isolation is enforced by a `WHERE` guard on the expected current status (compare-
//! and-set) or a `UNIQUE` constraint. The store never holds an in-process lock across
//! workers — the database is the only synchronization substrate.

pub mod analysis_data;
pub mod claim;
pub mod create_job;
pub mod job_file;
pub mod job_message;
pub mod update_status;

use sea_orm::ConnectionTrait;

/// A handle to the shared job store, borrowing a SeaORM connection.
///
/// Generic over `ConnectionTrait` so the same operations run against a pooled
/// `DatabaseConnection` in production and an in-memory SQLite `DatabaseConnection` in tests.
pub struct JobStore<'a, C: ConnectionTrait> {
    pub(crate) db: &'a C,
    /// When `false` (the default), every store operation that touches `analysis_stats`
    /// issues its own counter increment/decrement statement. Some deployments instead mirror
    /// job transitions into `analysis_stats` with database triggers; constructing the store
    /// with `stats_by_trigger(true)` skips this crate's own increments so the two don't
    /// double-count.
    pub(crate) stats_by_trigger: bool,
}

impl<'a, C: ConnectionTrait> JobStore<'a, C> {
    /// Wraps a connection as a job store handle with this crate managing `analysis_stats`
    /// directly.
    pub fn new(db: &'a C) -> Self {
        Self { db, stats_by_trigger: false }
    }

    /// Wraps a connection as a job store handle, optionally deferring `analysis_stats`
    /// maintenance to database triggers instead of this crate's own statements.
    pub fn with_stats_mode(db: &'a C, stats_by_trigger: bool) -> Self {
        Self { db, stats_by_trigger }
    }
}

/// Builds `n` positional placeholders for `backend`: `?` repeated for MySQL, `$1..$n`
/// everywhere else (Postgres and SQLite both accept the dollar form through SeaORM's raw
/// statement binder).
pub(crate) fn placeholders(backend: sea_orm::DbBackend, n: usize) -> Vec<String> {
    match backend {
        sea_orm::DbBackend::MySql => (0..n).map(|_| "?".to_string()).collect(),
        _ => (0..n).map(|i| format!("${}", i + 1)).collect(),
    }
}
