//! Error types for the reader

use thiserror::Error;

/// Main error type for the reader
#[derive(Error, Debug)]
pub enum Error {
    /// A single target failed to parse or evaluate
    #[error("query error: {0}")]
    Query(#[from] crate::query::error::QueryError),

    /// Request rejected by admission control
    #[error(transparent)]
    Throttled(#[from] crate::throttling::ThrottleError),

    /// Index collaborator failure
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Store collaborator failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Degenerate time window in a request
    #[error(transparent)]
    InvalidRange(#[from] crate::types::InvalidTimeRange),

    /// Every target in a render request was syntactically invalid
    #[error("no target in the request could be parsed")]
    AllTargetsInvalid,
}

/// Index collaborator errors
#[derive(Error, Debug)]
pub enum IndexError {
    /// The index backend cannot be reached
    #[error("index backend unavailable: {0}")]
    Unavailable(String),

    /// The index rejected the pattern
    #[error("index rejected pattern '{pattern}': {reason}")]
    BadPattern {
        /// Pattern that was rejected
        pattern: String,
        /// Backend-supplied reason
        reason: String,
    },
}

/// Store collaborator errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The storage backend cannot be reached
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// The backend returned a malformed series
    #[error("storage returned invalid data for '{path}': {reason}")]
    InvalidData {
        /// Concrete metric path
        path: String,
        /// What was wrong with the payload
        reason: String,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed
    #[error("failed to parse config file {path}: {reason}")]
    Parse {
        /// File path
        path: String,
        /// Parser message
        reason: String,
    },

    /// A value failed validation
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for reader operations
pub type Result<T> = std::result::Result<T, Error>;
