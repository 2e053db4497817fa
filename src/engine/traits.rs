//! Core trait definitions for the reader's external collaborators

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{IndexError, StoreError};
use crate::types::{PathNode, PathStats, TierSeries, TimeRange};

// =============================================================================
// IndexService Trait
// =============================================================================

/// Contract for the search index collaborator
///
/// Resolves glob-style path patterns to concrete metric paths. The matching
/// engine itself lives in the backend; the reader only consumes resolved
/// lists. An empty result is not an error.
#[async_trait]
pub trait IndexService: Send + Sync + 'static {
    /// Unique identifier for this index backend
    fn service_id(&self) -> &str;

    /// Resolve a pattern to the concrete leaf paths it matches
    async fn resolve_pattern(
        &self,
        tenant: &str,
        pattern: &str,
    ) -> Result<Vec<String>, IndexError>;

    /// Find all nodes (leaves and branches) a pattern matches
    async fn find(&self, tenant: &str, pattern: &str) -> Result<Vec<PathNode>, IndexError>;

    /// Cardinality summary for a pattern
    async fn path_stats(&self, tenant: &str, pattern: &str) -> Result<PathStats, IndexError>;

    /// Release backend connections
    async fn shutdown(&self);
}

// =============================================================================
// StoreService Trait
// =============================================================================

/// Contract for the column-store collaborator
///
/// Fetches raw partial series for one concrete path. A path may come back in
/// several tiers (retention levels); tier precedence is assigned by the
/// implementation, never inferred by the reader. Transport-level retries, if
/// any, belong to the implementation.
#[async_trait]
pub trait StoreService: Send + Sync + 'static {
    /// Unique identifier for this store backend
    fn service_id(&self) -> &str;

    /// Fetch all tiers of raw data for one concrete path
    async fn fetch(
        &self,
        tenant: &str,
        path: &str,
        range: TimeRange,
    ) -> Result<Vec<TierSeries>, StoreError>;

    /// Release backend connections
    async fn shutdown(&self);
}

// =============================================================================
// StatsService Trait
// =============================================================================

/// Fire-and-forget counters and timers for query activity
///
/// Implementations must never fail or block evaluation; the no-op variant is
/// always a valid substitute.
pub trait StatsService: Send + Sync + 'static {
    /// Record a completed render request
    fn record_render(&self, tenant: &str, duration: Duration, success: bool);

    /// Record one function invocation during evaluation
    fn record_function_call(&self, function: &str);

    /// Record how many concrete paths a leaf resolved to
    fn record_paths_resolved(&self, tenant: &str, count: usize);

    /// Record a throttled request
    fn record_throttled(&self, tenant: &str, reason: &str);

    /// Flush any buffered state
    fn shutdown(&self);
}
