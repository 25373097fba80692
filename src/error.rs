//! Error types for kindred.

use thiserror::Error;

/// Errors surfaced by index maintenance and queries.
///
/// "No matches" is never an error: unknown ids and empty interest lists
/// produce empty result sets. Errors are reserved for contract violations
/// and backing-store outages.
#[derive(Debug, Error)]
pub enum MatchError {
    /// A caller-supplied parameter is outside its contract (e.g. `k == 0`).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The backing profile store failed during a lookup or rebuild.
    ///
    /// This must propagate: an empty index standing in for an unreachable
    /// store would read as "no matches for anyone".
    #[error("backing store failure: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl MatchError {
    /// Wrap a backing-store error.
    pub fn store(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        MatchError::Store(err.into())
    }
}

/// Result type for matching operations.
pub type Result<T> = std::result::Result<T, MatchError>;
