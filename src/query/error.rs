//! Query error taxonomy
//!
//! Every error here is scoped to the single target expression that produced
//! it; sibling targets in the same render request keep evaluating. Throttling
//! rejections are deliberately *not* part of this type; they live in
//! [`crate::throttling`] and apply to the whole request.

use thiserror::Error;

use crate::error::{IndexError, StoreError};
use crate::series::SeriesError;

/// Error for one target expression
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed target expression
    #[error("syntax error at offset {position}: expected {expected}")]
    Syntax {
        /// Byte offset into the target string where parsing failed
        position: usize,
        /// What the parser was looking for
        expected: String,
    },

    /// Target referenced a function that is not registered
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// Argument list did not match the function's signature
    #[error("bad arguments to {function}: expected {expected}, got {got}")]
    Argument {
        /// Function being invoked
        function: String,
        /// Declared signature
        expected: String,
        /// What the call supplied
        got: String,
    },

    /// A pattern resolved to more paths than the tenant's rule allows
    #[error("pattern '{pattern}' matched {resolved} paths, limit is {limit}")]
    PathCardinalityExceeded {
        /// Offending pattern
        pattern: String,
        /// Paths it resolved to
        resolved: usize,
        /// Tenant's configured bound
        limit: usize,
    },

    /// Series construction or alignment failure
    #[error(transparent)]
    Series(#[from] SeriesError),

    /// The index collaborator failed; not retried here
    #[error("index unavailable: {0}")]
    IndexUnavailable(#[from] IndexError),

    /// The store collaborator failed; not retried here
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    /// Target evaluated to a bare scalar instead of series
    #[error("target does not evaluate to series: {0}")]
    InvalidTarget(String),
}

impl QueryError {
    /// Whether this is a parse-time failure
    pub fn is_syntax(&self) -> bool {
        matches!(self, QueryError::Syntax { .. })
    }
}

/// Result type alias for per-target operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;
