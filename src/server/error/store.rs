//! Job store error types.
//!
//! This module defines errors raised by the job store while creating, claiming, and updating
//! jobs against the shared SQL schema. Most of these indicate either a data integrity problem
//! (duplicate input, missing analysis) or a transient condition the caller should retry
//! (deadlock while racing other workers for the same rows).

use thiserror::Error;

/// Errors from job store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No analysis exists with the given logic name or id.
    #[error("unknown analysis: {0}")]
    UnknownAnalysis(String),

    /// A job was referenced by id but does not exist.
    #[error("unknown job: {0}")]
    UnknownJob(i32),

    /// A claim attempt raced another worker and lost; the caller should try the next batch.
    #[error("job {0} was claimed by another worker before this one")]
    LostClaimRace(i32),

    /// An `UPDATE ... WHERE status = ...` guarded transition did not match any row, meaning
    /// the job's status changed underneath the caller.
    #[error("job {job_id} was not in expected status {expected} when updating")]
    StaleStatus {
        /// Job whose transition was attempted.
        job_id: i32,
        /// Status the caller expected the job to be in.
        expected: String,
    },

    /// The store's retry budget for a deadlocked transaction was exhausted.
    #[error("exceeded {attempts} retry attempts for deadlocked transaction: {last_error}")]
    DeadlockRetriesExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Display of the last error encountered.
        last_error: String,
    },
}
