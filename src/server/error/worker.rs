//! Worker lifecycle error types.
//!
//! Errors raised while a worker registers itself, claims work, runs a runnable, or records
//! its own death.

use thiserror::Error;

/// Errors from the worker lifecycle loop.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// No runnable is registered under the analysis's configured module name.
    #[error("no runnable registered for module `{0}`")]
    UnknownRunnable(String),

    /// The analysis this worker was asked to work on does not exist.
    #[error("unknown analysis: {0}")]
    UnknownAnalysis(String),

    /// A job's parameters failed to deserialize into the shape the runnable expected.
    #[error("failed to decode job parameters: {0}")]
    ParamDecode(String),
}
