//! Error retry strategy determination.
//!
//! This module defines retry strategies for different error types, allowing the store and
//! worker loop to distinguish between transient errors (worth retrying with a bounded linear
//! backoff) and permanent errors (that should surface to the caller immediately). Deadlock
//! detection on `UPDATE ... WHERE status = ...` races is the primary transient case this
//! crate needs to recognize.

use sea_orm::DbErr;

use super::Error;

/// Strategy for handling errors encountered while operating against the shared job store.
pub enum ErrorRetryStrategy {
    /// Retry the operation, typically with a short linear backoff.
    ///
    /// Used for transient errors that resolve once a racing transaction completes, such as:
    /// - Database deadlocks detected by the backend
    /// - Connection acquisition failures
    /// - A claim that lost a race to another worker
    Retry,

    /// Fail permanently without retry.
    ///
    /// Used for errors that indicate a data integrity problem or a programming bug, such as:
    /// - Unknown analyses or jobs
    /// - Malformed dataflow rules or templates
    /// - Configuration errors
    Fail,
}

impl Error {
    /// Determines the appropriate retry strategy for this error.
    ///
    /// # Retry Strategy Guidelines
    ///
    /// **Transient errors (Retry):**
    /// - `DbErr::ConnectionAcquire` / `DbErr::Conn` - connection pool may recover
    /// - A raw SQL deadlock (backend-specific error code) surfaced through `DbErr::Query` or
    ///   `DbErr::Exec`
    /// - `StoreError::LostClaimRace` - another worker claimed the row first; the caller should
    ///   move on to the next candidate job, which is itself a form of retry
    ///
    /// **Permanent errors (Fail):**
    /// - Unknown analysis/job/worker references
    /// - Parse and template errors
    /// - Configuration errors
    /// - Internal errors (bugs in this crate)
    pub fn to_retry_strategy(&self) -> ErrorRetryStrategy {
        match self {
            Self::DbErr(db_err) => match db_err {
                DbErr::ConnectionAcquire(_) => ErrorRetryStrategy::Retry,
                DbErr::Conn(_) => ErrorRetryStrategy::Retry,
                DbErr::Exec(runtime_err) | DbErr::Query(runtime_err)
                    if is_deadlock(&runtime_err.to_string()) =>
                {
                    ErrorRetryStrategy::Retry
                }
                _ => ErrorRetryStrategy::Fail,
            },

            Self::StoreError(super::store::StoreError::LostClaimRace(_)) => {
                ErrorRetryStrategy::Retry
            }
            Self::StoreError(super::store::StoreError::DeadlockRetriesExhausted { .. }) => {
                ErrorRetryStrategy::Fail
            }
            Self::StoreError(_) => ErrorRetryStrategy::Fail,

            Self::ConfigError(_) => ErrorRetryStrategy::Fail,
            Self::DataflowError(_) => ErrorRetryStrategy::Fail,
            Self::GcError(_) => ErrorRetryStrategy::Fail,
            Self::WorkerError(_) => ErrorRetryStrategy::Fail,
            Self::ParseError(_) => ErrorRetryStrategy::Fail,
            Self::InternalError(_) => ErrorRetryStrategy::Fail,
            Self::UrlError(_) => ErrorRetryStrategy::Fail,
        }
    }
}

/// Recognizes the deadlock phrasing used by SQLite, MySQL, and Postgres drivers.
///
/// Backend drivers do not expose a portable deadlock error variant through `sea_orm::DbErr`,
/// so this falls back to matching on the wording each backend uses. SQLite reports `database
/// is locked`, MySQL reports `Deadlock found`, and Postgres reports `deadlock detected`.
fn is_deadlock(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("deadlock") || lower.contains("database is locked")
}
