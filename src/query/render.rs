//! Render entry point and sibling surfaces
//!
//! [`ReaderService`] is what the (external) HTTP layer calls. One admission
//! permit gates a whole render request before any parsing happens; after
//! admission every target parses and evaluates independently, so one bad
//! target never aborts its siblings. The request as a whole fails only on a
//! throttle rejection or when every target was unparseable.
//!
//! `find`, `search` and `path_stats` are thin delegations to the index
//! collaborator and carry no evaluation logic.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::engine::traits::{IndexService, StatsService};
use crate::error::Error;
use crate::query::error::QueryError;
use crate::query::evaluator::Evaluator;
use crate::query::parser;
use crate::series::Series;
use crate::throttling::ThrottlingService;
use crate::types::{PathNode, PathStats, TimeRange};

/// Outcome for one requested target
#[derive(Debug)]
pub struct TargetResult {
    /// The target string as requested
    pub target: String,
    /// Rendered series, or the typed per-target failure
    pub outcome: Result<Vec<Series>, QueryError>,
}

/// The reader's produced interface
///
/// Owns the evaluator and consults admission control around it. Construct
/// once at startup and share behind an `Arc`.
pub struct ReaderService {
    evaluator: Evaluator,
    index: Arc<dyn IndexService>,
    throttling: ThrottlingService,
    stats: Arc<dyn StatsService>,
}

impl ReaderService {
    /// Assemble the service from its collaborators
    pub fn new(
        evaluator: Evaluator,
        index: Arc<dyn IndexService>,
        throttling: ThrottlingService,
        stats: Arc<dyn StatsService>,
    ) -> Self {
        Self {
            evaluator,
            index,
            throttling,
            stats,
        }
    }

    /// Evaluate a render request
    ///
    /// Admission is checked exactly once, before parsing; the permit is held
    /// until every target settles and is released even if this future is
    /// dropped mid-flight.
    pub async fn render(
        &self,
        tenant: &str,
        targets: &[String],
        from: i64,
        until: i64,
    ) -> Result<Vec<TargetResult>, Error> {
        let range = TimeRange::new(from, until)?;

        let _permit = match self.throttling.try_admit(tenant) {
            Ok(permit) => permit,
            Err(rejection) => {
                warn!(tenant, %rejection, "render request throttled");
                self.stats.record_throttled(tenant, rejection_label(&rejection));
                return Err(rejection.into());
            }
        };
        let max_paths = self.throttling.max_paths(tenant);

        let started = Instant::now();
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let outcome = self.render_target(tenant, range, target, max_paths).await;
            if let Err(err) = &outcome {
                debug!(tenant, target = target.as_str(), %err, "target failed");
            }
            results.push(TargetResult {
                target: target.clone(),
                outcome,
            });
        }

        let success = results.iter().any(|r| r.outcome.is_ok());
        self.stats
            .record_render(tenant, started.elapsed(), success);

        let total_parse_failure = !results.is_empty()
            && results
                .iter()
                .all(|r| matches!(&r.outcome, Err(e) if e.is_syntax()));
        if total_parse_failure {
            return Err(Error::AllTargetsInvalid);
        }

        Ok(results)
    }

    async fn render_target(
        &self,
        tenant: &str,
        range: TimeRange,
        target: &str,
        max_paths: Option<usize>,
    ) -> Result<Vec<Series>, QueryError> {
        let expression = parser::parse(target)?;
        self.evaluator
            .evaluate(tenant, range, &expression, max_paths)
            .await
    }

    /// Find index nodes matching a pattern
    pub async fn find(&self, tenant: &str, pattern: &str) -> Result<Vec<PathNode>, Error> {
        Ok(self.index.find(tenant, pattern).await?)
    }

    /// Search the index with a free-text query
    ///
    /// The index interprets the query; treated here as a pattern prefix
    /// search over dotted paths.
    pub async fn search(&self, tenant: &str, query: &str) -> Result<Vec<PathNode>, Error> {
        let pattern = if query.ends_with('*') {
            query.to_string()
        } else {
            format!("{}*", query)
        };
        Ok(self.index.find(tenant, &pattern).await?)
    }

    /// Cardinality summary for a pattern
    pub async fn path_stats(&self, tenant: &str, pattern: &str) -> Result<PathStats, Error> {
        Ok(self.index.path_stats(tenant, pattern).await?)
    }
}

impl std::fmt::Debug for ReaderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderService")
            .field("evaluator", &self.evaluator)
            .finish()
    }
}

fn rejection_label(rejection: &crate::throttling::ThrottleError) -> &'static str {
    match rejection {
        crate::throttling::ThrottleError::ConcurrencyLimitExceeded(_) => "concurrency",
        crate::throttling::ThrottleError::RateLimitExceeded(_) => "rate",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stubs::{MemoryIndexService, MemoryStoreService, RecordingStats};
    use crate::query::functions::FunctionRegistry;
    use crate::throttling::{ThrottlingConfig, ThrottlingRule};
    use crate::types::{Tier, TierSeries};

    fn constant(name: &str, value: f64) -> Series {
        Series::from_values(name, 0, 60, vec![Some(value); 4]).unwrap()
    }

    fn reader(
        index: MemoryIndexService,
        store: MemoryStoreService,
        throttling: ThrottlingConfig,
    ) -> ReaderService {
        let index: Arc<dyn IndexService> = Arc::new(index);
        let stats: Arc<dyn StatsService> = Arc::new(RecordingStats::new());
        let evaluator = Evaluator::new(
            Arc::new(FunctionRegistry::builtin()),
            Arc::clone(&index),
            Arc::new(store),
            Arc::clone(&stats),
            4,
        );
        ReaderService::new(evaluator, index, ThrottlingService::new(throttling), stats)
    }

    fn fixture_reader(throttling: ThrottlingConfig) -> ReaderService {
        let index = MemoryIndexService::new().with_paths("t", ["a.1", "a.2"]);
        let store = MemoryStoreService::new()
            .with_series("t", "a.1", vec![TierSeries::new(Tier(0), constant("a.1", 1.0))])
            .with_series("t", "a.2", vec![TierSeries::new(Tier(0), constant("a.2", 2.0))]);
        reader(index, store, throttling)
    }

    #[tokio::test]
    async fn test_bad_target_does_not_abort_siblings() {
        let reader = fixture_reader(ThrottlingConfig::default());
        let targets = vec![
            "unknownFn(a.*)".to_string(),
            "sumSeries(a.*)".to_string(),
            "sum(".to_string(),
        ];

        let results = reader.render("t", &targets, 0, 240).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(matches!(
            results[0].outcome,
            Err(QueryError::UnknownFunction(_))
        ));
        assert!(results[1].outcome.is_ok());
        assert!(matches!(results[2].outcome, Err(QueryError::Syntax { .. })));
    }

    #[tokio::test]
    async fn test_all_targets_unparseable_fails_request() {
        let reader = fixture_reader(ThrottlingConfig::default());
        let targets = vec!["sum(".to_string(), ")".to_string()];

        let err = reader.render("t", &targets, 0, 240).await.unwrap_err();
        assert!(matches!(err, Error::AllTargetsInvalid));
    }

    #[tokio::test]
    async fn test_throttle_rejection_short_circuits() {
        let config = ThrottlingConfig {
            default_rule: ThrottlingRule {
                max_concurrent: 0,
                ..ThrottlingRule::default()
            },
            ..ThrottlingConfig::default()
        };
        let reader = fixture_reader(config);

        let targets = vec!["a.*".to_string()];
        let err = reader.render("t", &targets, 0, 240).await.unwrap_err();
        assert!(matches!(err, Error::Throttled(_)));
    }

    #[tokio::test]
    async fn test_invalid_time_range_rejected() {
        let reader = fixture_reader(ThrottlingConfig::default());
        let targets = vec!["a.*".to_string()];
        let err = reader.render("t", &targets, 240, 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
    }

    #[tokio::test]
    async fn test_permit_released_after_render() {
        let config = ThrottlingConfig {
            default_rule: ThrottlingRule {
                max_concurrent: 1,
                ..ThrottlingRule::default()
            },
            ..ThrottlingConfig::default()
        };
        let reader = fixture_reader(config);
        let targets = vec!["a.*".to_string()];

        // Two sequential renders both admit: the permit from the first is
        // released when it completes.
        assert!(reader.render("t", &targets, 0, 240).await.is_ok());
        assert!(reader.render("t", &targets, 0, 240).await.is_ok());
    }

    #[tokio::test]
    async fn test_find_and_path_stats_delegate() {
        let reader = fixture_reader(ThrottlingConfig::default());

        let nodes = reader.find("t", "a.*").await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| n.leaf));

        let stats = reader.path_stats("t", "a.*").await.unwrap();
        assert_eq!(stats, PathStats { total: 2, leaves: 2 });

        let found = reader.search("t", "a.").await.unwrap();
        assert_eq!(found.len(), 2);
    }
}
