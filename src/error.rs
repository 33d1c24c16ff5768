//! MIM error types.
//!
//! # Error Classification
//!
//! Only construction-time problems surface as errors:
//!
//! - **Configuration**: out-of-range probabilities, inverted ranges, a variance
//!   that cannot produce a valid Beta distribution
//! - **Population**: graphs whose node weights are not dense ids, parameter
//!   lists that do not match the population size
//!
//! Once a [`Model`](crate::model::Model) exists, stepping it never fails.
//! Undefined numeric results (an opinion of `0/0`, an empty polarization bin)
//! are replaced by `0` where they occur, and unknown agent ids are reported as
//! `None` by lookups.

use thiserror::Error;

/// MIM errors.
#[derive(Error, Debug)]
pub enum MimError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// A target mean and variance do not describe a valid Beta distribution.
    #[error("Invalid belief: mean {mean} with variance {variance} does not give positive shape parameters")]
    InvalidBelief {
        /// Requested belief mean.
        mean: f64,
        /// Configured opinion variance.
        variance: f64,
    },

    /// Graph cannot host a population.
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// Parameter provider supplied the wrong number of parameter sets.
    #[error("Expected {expected} agent parameters, got {actual}")]
    ParameterCount {
        /// Number of parameter sets the graph requires.
        expected: usize,
        /// Number of parameter sets supplied.
        actual: usize,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for MIM operations
pub type Result<T> = std::result::Result<T, MimError>;

impl From<toml::de::Error> for MimError {
    fn from(err: toml::de::Error) -> Self {
        MimError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MimError {
    fn from(err: toml::ser::Error) -> Self {
        MimError::Config(err.to_string())
    }
}
