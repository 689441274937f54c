//! Garbage collection error types.
//!
//! Errors raised while reconciling jobs left behind by workers that died without reporting
//! their status honestly (crashed, killed, or lost contact).

use thiserror::Error;

/// Errors from garbage collection passes.
#[derive(Error, Debug)]
pub enum GcError {
    /// The worker referenced by a job's `worker_id` does not exist in the `worker` table.
    #[error("job {job_id} references unknown worker {worker_id}")]
    UnknownWorker {
        /// Job whose worker could not be found.
        job_id: i32,
        /// The missing worker id.
        worker_id: i32,
    },
}
