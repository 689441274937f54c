//! Configuration error types.
//!
//! This module defines errors related to worker configuration, encountered during startup
//! when required CLI arguments or environment variables are missing or contain invalid
//! values.

use thiserror::Error;

/// Configuration error type for CLI/environment validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is not set and no equivalent CLI flag was given.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// A configuration value is invalid or malformed.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        /// Name of the offending flag or environment variable.
        var: String,
        /// Explanation of why the value was rejected.
        reason: String,
    },
}
