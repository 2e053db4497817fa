//! Graphite Reader - read-only query engine for time-series storage
//!
//! This library is the evaluation core of a Graphite-compatible render
//! service:
//! - Target expression parsing into function-call trees
//! - A closed registry of series-transforming functions
//! - Bottom-up tree evaluation with bounded, ordered storage fan-out
//! - Step reconciliation and tier-precedence merging of partial series
//! - Per-tenant and global admission control
//!
//! The HTTP layer, the search index and the column store are external
//! collaborators behind the async traits in [`engine`]; in-memory doubles for
//! all of them live in [`engine::stubs`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod query;
pub mod series;
pub mod services;
pub mod throttling;
pub mod types;

// Re-export main types
pub use config::Config;
pub use error::{Error, Result};
pub use query::{Evaluator, Expression, FunctionRegistry, QueryError, ReaderService, TargetResult};
pub use series::{Series, SeriesError};
pub use services::ReaderContext;
pub use throttling::{Permit, ThrottleError, ThrottlingConfig, ThrottlingRule, ThrottlingService};
pub use types::{TierSeries, TimeRange};

#[cfg(test)]
mod tests {
    #[test]
    fn test_basic_sanity() {
        assert_eq!(2 + 2, 4);
    }
}
