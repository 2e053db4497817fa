//! Expression tree evaluation
//!
//! Walks a parsed target expression bottom-up:
//!
//! 1. **Path leaves** resolve to concrete paths via the index collaborator
//!    (bounded by the tenant's resolved-path limit), then fetch raw series
//!    from the store with bounded, order-preserving fan-out; tiers of one
//!    path are reconciled to a common step and merged by precedence.
//! 2. **Literals** pass through as scalars.
//! 3. **Calls** evaluate all children first (one barrier per subtree), look
//!    the function up in the registry, validate the argument list against its
//!    signature and apply it.
//!
//! The only suspension points are the two collaborator calls; everything
//! between them is pure. Dropping the returned future abandons in-flight
//! fetches; no partial result is ever produced.

use futures::future::{try_join_all, BoxFuture};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

use crate::engine::traits::{IndexService, StatsService, StoreService};
use crate::query::ast::{Expression, FunctionCall};
use crate::query::error::{QueryError, QueryResult};
use crate::query::functions::{EvalValue, FunctionRegistry};
use crate::series::{merge, Series};
use crate::types::{TierSeries, TimeRange};

/// Evaluates expression trees against the index and store collaborators
///
/// One evaluator is shared by all requests; it holds no per-request state.
pub struct Evaluator {
    registry: Arc<FunctionRegistry>,
    index: Arc<dyn IndexService>,
    store: Arc<dyn StoreService>,
    stats: Arc<dyn StatsService>,
    fetch_concurrency: usize,
}

/// Per-request evaluation parameters
struct EvalRequest {
    tenant: String,
    range: TimeRange,
    max_paths: Option<usize>,
}

impl Evaluator {
    /// Create an evaluator
    ///
    /// `fetch_concurrency` bounds simultaneous outstanding store fetches for
    /// one leaf; values below 1 are clamped to 1.
    pub fn new(
        registry: Arc<FunctionRegistry>,
        index: Arc<dyn IndexService>,
        store: Arc<dyn StoreService>,
        stats: Arc<dyn StatsService>,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            registry,
            index,
            store,
            stats,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    /// Evaluate one expression tree into its output series
    ///
    /// `max_paths` is the tenant's resolved-path bound from its throttling
    /// rule. A tree that evaluates to a bare literal is rejected, since render
    /// targets must produce series.
    pub async fn evaluate(
        &self,
        tenant: &str,
        range: TimeRange,
        expression: &Expression,
        max_paths: Option<usize>,
    ) -> QueryResult<Vec<Series>> {
        let request = EvalRequest {
            tenant: tenant.to_string(),
            range,
            max_paths,
        };
        match self.eval_node(&request, expression).await? {
            EvalValue::Series(list) => Ok(list),
            other => Err(QueryError::InvalidTarget(format!(
                "'{}' evaluates to a bare {}",
                expression,
                other.kind()
            ))),
        }
    }

    fn eval_node<'a>(
        &'a self,
        request: &'a EvalRequest,
        node: &'a Expression,
    ) -> BoxFuture<'a, QueryResult<EvalValue>> {
        Box::pin(async move {
            match node {
                Expression::Number(n) => Ok(EvalValue::Number(*n)),
                Expression::Text(s) => Ok(EvalValue::Text(s.clone())),
                Expression::Path(pattern) => self.eval_leaf(request, pattern).await,
                Expression::Call(call) => self.eval_call(request, call).await,
            }
        })
    }

    /// Resolve a pattern and fetch every concrete path it names
    ///
    /// Output order follows resolution order: the fetch stream is buffered,
    /// not unordered.
    async fn eval_leaf(&self, request: &EvalRequest, pattern: &str) -> QueryResult<EvalValue> {
        let paths = self
            .index
            .resolve_pattern(&request.tenant, pattern)
            .await?;

        if let Some(limit) = request.max_paths {
            if paths.len() > limit {
                return Err(QueryError::PathCardinalityExceeded {
                    pattern: pattern.to_string(),
                    resolved: paths.len(),
                    limit,
                });
            }
        }
        self.stats
            .record_paths_resolved(&request.tenant, paths.len());
        debug!(
            tenant = %request.tenant,
            pattern,
            resolved = paths.len(),
            "resolved path pattern"
        );

        let fetches = paths.into_iter().map(|path| {
            let store = Arc::clone(&self.store);
            let tenant = request.tenant.clone();
            let range = request.range;
            async move {
                let tiers = store.fetch(&tenant, &path, range).await?;
                merge_tiers(&path, tiers)
            }
        });

        let merged: Vec<Option<Series>> = stream::iter(fetches)
            .buffered(self.fetch_concurrency)
            .try_collect()
            .await?;

        Ok(EvalValue::Series(merged.into_iter().flatten().collect()))
    }

    /// Evaluate all children, then validate and apply the function
    async fn eval_call(&self, request: &EvalRequest, call: &FunctionCall) -> QueryResult<EvalValue> {
        // Children run concurrently; this await is the per-subtree barrier
        let args = try_join_all(
            call.args
                .iter()
                .map(|child| self.eval_node(request, child)),
        )
        .await?;

        let function = self.registry.resolve(&call.name)?;
        function.signature().validate(&call.name, &args)?;
        self.stats.record_function_call(&call.name);

        let output = function.apply(&call.to_string(), args)?;
        Ok(EvalValue::Series(output))
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("index", &self.index.service_id())
            .field("store", &self.store.service_id())
            .field("fetch_concurrency", &self.fetch_concurrency)
            .finish()
    }
}

/// Merge the fetched tiers of one concrete path into a single series
///
/// Tiers are sorted ascending by their explicit precedence rank so the
/// highest-precedence tier writes last; mixed resolutions are reconciled to
/// the coarsest step first. No tiers means no series for this path.
fn merge_tiers(path: &str, mut tiers: Vec<TierSeries>) -> QueryResult<Option<Series>> {
    if tiers.is_empty() {
        return Ok(None);
    }
    tiers.sort_by_key(|t| t.tier);

    let coarsest = tiers
        .iter()
        .map(|t| t.series.step)
        .max()
        .unwrap_or(1);

    let mut partials = Vec::with_capacity(tiers.len());
    for tier in tiers {
        partials.push(tier.series.resample_to_step(coarsest)?);
    }

    Ok(Some(merge(path, &partials)?))
}
