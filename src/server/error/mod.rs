//! Error types for the apiary dataflow scheduler.
//!
//! This module provides a comprehensive error handling system with specialized error types
//! for different domains (configuration, job store, dataflow, garbage collection, worker
//! lifecycle). All errors use `thiserror` for ergonomic error definitions with automatic
//! `Display` and `Error` trait implementations, and aggregate into a single [`Error`] enum
//! via `#[from]` conversions so callers can use `?` across domain boundaries.

pub mod config;
pub mod dataflow;
pub mod gc;
pub mod retry;
pub mod store;
pub mod worker;

use thiserror::Error;

use crate::server::error::{
    config::ConfigError, dataflow::DataflowError, gc::GcError, store::StoreError,
    worker::WorkerError,
};

/// Main error type for the apiary dataflow scheduler.
///
/// This enum aggregates all domain-specific error types and external library errors into a
/// single unified error type. It uses `thiserror`'s `#[from]` attribute to enable automatic
/// conversion from underlying error types via the `?` operator.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (missing or invalid CLI/environment values).
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
    /// Job store error (claim/create/update failures against the shared schema).
    #[error(transparent)]
    StoreError(#[from] StoreError),
    /// Dataflow error (rule evaluation, template substitution, fan/funnel bookkeeping).
    #[error(transparent)]
    DataflowError(#[from] DataflowError),
    /// Garbage collection error (dead worker reconciliation).
    #[error(transparent)]
    GcError(#[from] GcError),
    /// Worker lifecycle error (registration, heartbeat, runnable dispatch).
    #[error(transparent)]
    WorkerError(#[from] WorkerError),
    /// Parse error (failed to parse a value from string or other format).
    #[error("failed to parse value: {0:?}")]
    ParseError(String),
    /// Internal error indicating a bug in this crate's code.
    #[error("internal error, please file an issue: {0:?}")]
    InternalError(String),
    /// Database error (query failures, connection issues, constraint violations).
    #[error(transparent)]
    DbErr(#[from] sea_orm::DbErr),
    /// Resource URL could not be parsed.
    #[error(transparent)]
    UrlError(#[from] url::ParseError),
}
