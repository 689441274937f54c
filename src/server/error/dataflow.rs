//! Dataflow engine error types.
//!
//! Errors raised while evaluating dataflow rules for a completed job: resolving branch
//! targets, substituting `input_id_template` placeholders, and updating fan/funnel
//! semaphore counters.

use thiserror::Error;

/// Errors from dataflow rule evaluation.
#[derive(Error, Debug)]
pub enum DataflowError {
    /// An `input_id_template` referenced a parameter that the job's fanned output did not
    /// provide.
    #[error("template references unknown parameter `#{0}#`")]
    UnknownTemplateParam(String),

    /// A funnel job's `semaphore_count` went negative, meaning more children signaled
    /// completion than were ever fanned out.
    #[error("semaphore count for funnel job {0} went negative")]
    SemaphoreUnderflow(i32),

    /// A dataflow rule's `to_target` did not match any known target kind (analysis logic
    /// name, accumulator address, or table://-prefixed naked table).
    #[error("dataflow rule target `{0}` did not resolve to a known analysis or table")]
    UnresolvedTarget(String),

    /// An accumulator address's structure did not parse (e.g. malformed `{key}[]` path).
    #[error("malformed accumulator address `{0}`")]
    MalformedAccuAddress(String),
}
