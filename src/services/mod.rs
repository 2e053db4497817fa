//! Process lifecycle: startup wiring and ordered teardown
//!
//! The reader's collaborators (index, store, stats, throttling) are built
//! once at startup and carried in a [`ReaderContext`] passed by reference
//! into the handler layer, with no implicit globals. Teardown is an explicit,
//! ordered, testable sequence the process entry point invokes; nothing hangs
//! off a runtime hook mechanism.

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::engine::traits::{IndexService, StatsService, StoreService};
use crate::query::evaluator::Evaluator;
use crate::query::functions::FunctionRegistry;
use crate::query::render::ReaderService;
use crate::throttling::ThrottlingService;

/// Everything a running reader process holds
///
/// Construct with [`ReaderContext::new`] at startup; call
/// [`ReaderContext::shutdown`] exactly once at exit.
pub struct ReaderContext {
    /// Loaded configuration
    pub config: Config,
    /// Search index collaborator
    pub index: Arc<dyn IndexService>,
    /// Column store collaborator
    pub store: Arc<dyn StoreService>,
    /// Stats sink
    pub stats: Arc<dyn StatsService>,
    /// Admission control
    pub throttling: ThrottlingService,
    /// The produced query interface
    pub reader: ReaderService,
}

impl ReaderContext {
    /// Wire the reader from configuration and collaborator implementations
    pub fn new(
        config: Config,
        index: Arc<dyn IndexService>,
        store: Arc<dyn StoreService>,
        stats: Arc<dyn StatsService>,
    ) -> Self {
        info!(
            index = index.service_id(),
            store = store.service_id(),
            "assembling reader context"
        );

        let throttling = ThrottlingService::new(config.throttling.clone());
        let registry = Arc::new(FunctionRegistry::builtin());

        let evaluator = Evaluator::new(
            registry,
            Arc::clone(&index),
            Arc::clone(&store),
            Arc::clone(&stats),
            config.query.fetch_concurrency,
        );
        let reader = ReaderService::new(
            evaluator,
            Arc::clone(&index),
            throttling.clone(),
            Arc::clone(&stats),
        );

        Self {
            config,
            index,
            store,
            stats,
            throttling,
            reader,
        }
    }

    /// Tear the process down in dependency order
    ///
    /// Index first (stop resolving), then the store (drain fetch
    /// connections), then the stats sink (flush). Safe to call from the
    /// entry point after the external server has stopped accepting requests.
    pub async fn shutdown(&self) {
        info!("shutting down index service");
        self.index.shutdown().await;

        info!("shutting down store service");
        self.store.shutdown().await;

        info!("shutting down stats service");
        self.stats.shutdown();

        info!("shutdown complete");
    }
}

impl std::fmt::Debug for ReaderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderContext")
            .field("index", &self.index.service_id())
            .field("store", &self.store.service_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IndexError, StoreError};
    use crate::types::{PathNode, PathStats, TierSeries, TimeRange};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Shared teardown log asserting shutdown order
    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct OrderedIndex(Log);

    #[async_trait]
    impl IndexService for OrderedIndex {
        fn service_id(&self) -> &str {
            "ordered-index"
        }
        async fn resolve_pattern(
            &self,
            _tenant: &str,
            _pattern: &str,
        ) -> Result<Vec<String>, IndexError> {
            Ok(vec![])
        }
        async fn find(&self, _tenant: &str, _pattern: &str) -> Result<Vec<PathNode>, IndexError> {
            Ok(vec![])
        }
        async fn path_stats(
            &self,
            _tenant: &str,
            _pattern: &str,
        ) -> Result<PathStats, IndexError> {
            Ok(PathStats::default())
        }
        async fn shutdown(&self) {
            self.0.lock().push("index");
        }
    }

    struct OrderedStore(Log);

    #[async_trait]
    impl StoreService for OrderedStore {
        fn service_id(&self) -> &str {
            "ordered-store"
        }
        async fn fetch(
            &self,
            _tenant: &str,
            _path: &str,
            _range: TimeRange,
        ) -> Result<Vec<TierSeries>, StoreError> {
            Ok(vec![])
        }
        async fn shutdown(&self) {
            self.0.lock().push("store");
        }
    }

    struct OrderedStats(Log);

    impl StatsService for OrderedStats {
        fn record_render(&self, _tenant: &str, _duration: Duration, _success: bool) {}
        fn record_function_call(&self, _function: &str) {}
        fn record_paths_resolved(&self, _tenant: &str, _count: usize) {}
        fn record_throttled(&self, _tenant: &str, _reason: &str) {}
        fn shutdown(&self) {
            self.0.lock().push("stats");
        }
    }

    #[tokio::test]
    async fn test_shutdown_order_is_index_store_stats() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let context = ReaderContext::new(
            Config::default(),
            Arc::new(OrderedIndex(Arc::clone(&log))),
            Arc::new(OrderedStore(Arc::clone(&log))),
            Arc::new(OrderedStats(Arc::clone(&log))),
        );

        context.shutdown().await;
        assert_eq!(*log.lock(), vec!["index", "store", "stats"]);
    }

    #[tokio::test]
    async fn test_context_serves_queries_after_wiring() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let context = ReaderContext::new(
            Config::default(),
            Arc::new(OrderedIndex(Arc::clone(&log))),
            Arc::new(OrderedStore(Arc::clone(&log))),
            Arc::new(OrderedStats(log)),
        );

        // Empty index: the pattern matches nothing, which renders to an
        // empty series list rather than an error.
        let targets = vec!["sumSeries(any.thing.*)".to_string()];
        let results = context.reader.render("t", &targets, 0, 60).await.unwrap();
        assert!(results[0].outcome.as_ref().unwrap().is_empty());
    }
}
