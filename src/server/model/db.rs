//! Database model type aliases.
//!
//! This module provides convenient type aliases for SeaORM entity models used throughout the
//! scheduler. These aliases simplify type signatures and provide a single point of reference
//! for database model types, making it easier to work with entities without importing from
//! the generated `entity` crate directly.

/// A unit of work definition: module to run, default parameters, batching and retry policy.
pub type AnalysisModel = entity::analysis::Model;

/// Live counters and derived status for a single analysis, refreshed as jobs complete.
pub type AnalysisStatsModel = entity::analysis_stats::Model;

/// A single unit of work: one analysis applied to one input.
pub type JobModel = entity::job::Model;

/// A worker process bound to one analysis for its lifetime.
pub type WorkerModel = entity::worker::Model;

/// A dataflow rule routing a branch code from one analysis to a target.
pub type DataflowRuleModel = entity::dataflow_rule::Model;

/// A control rule blocking one analysis until another is done.
pub type AnalysisCtrlRuleModel = entity::analysis_ctrl_rule::Model;

/// Content-addressed large parameter blob, referenced by hash from `job.input_id`.
pub type AnalysisDataModel = entity::analysis_data::Model;

/// A log entry attached to a job or analysis.
pub type JobMessageModel = entity::job_message::Model;

/// Stdout/stderr file paths recorded for one attempt of a job.
pub type JobFileModel = entity::job_file::Model;

/// An accumulator slot written by fanned children and read by their funnel.
pub type AccuModel = entity::accu::Model;
