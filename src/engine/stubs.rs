//! In-memory collaborator doubles
//!
//! These implementations are intended for:
//! - **Unit testing** without a search index or column store
//! - **Integration testing** with programmable fixture data
//! - **Development and prototyping**
//!
//! # Available Stubs
//!
//! - [`MemoryIndexService`]: a fixture path list with glob matching. The
//!   production index resolves patterns server-side; the translation here
//!   exists only so fixtures behave like resolved lists.
//! - [`MemoryStoreService`]: programmable `(tenant, path)` → tiered series.
//! - [`RecordingStats`]: captures every stats call for assertions.
//!
//! **None of these are suitable for production use**: all state is lost on
//! restart and nothing is bounded.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::engine::traits::{IndexService, StatsService, StoreService};
use crate::error::{IndexError, StoreError};
use crate::types::{PathNode, PathStats, TierSeries, TimeRange};

/// Translate a Graphite glob pattern into an anchored regex
///
/// `*` and `?` match within one dotted segment, `{a,b}` is alternation and
/// `[...]` passes through as a character class; everything else matches
/// literally.
fn glob_to_regex(pattern: &str) -> Result<Regex, IndexError> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^.]*"),
            '?' => out.push_str("[^.]"),
            '.' => out.push_str("\\."),
            '{' => {
                let mut alternatives = Vec::new();
                let mut current = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    match inner {
                        '}' => {
                            closed = true;
                            break;
                        }
                        ',' => alternatives.push(std::mem::take(&mut current)),
                        other => current.push(other),
                    }
                }
                if !closed {
                    return Err(IndexError::BadPattern {
                        pattern: pattern.to_string(),
                        reason: "unterminated brace group".to_string(),
                    });
                }
                alternatives.push(current);
                let escaped: Vec<String> =
                    alternatives.iter().map(|a| regex::escape(a)).collect();
                out.push_str("(?:");
                out.push_str(&escaped.join("|"));
                out.push(')');
            }
            '[' => {
                out.push('[');
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == ']' {
                        break;
                    }
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    Regex::new(&out).map_err(|e| IndexError::BadPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// In-Memory Index
// =============================================================================

/// Index double backed by a fixture path list
pub struct MemoryIndexService {
    paths: RwLock<HashMap<String, Vec<String>>>,
    failing: AtomicBool,
}

impl MemoryIndexService {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            paths: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Seed leaf paths for a tenant, returning self for chaining
    pub fn with_paths<I, S>(self, tenant: &str, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths
            .write()
            .entry(tenant.to_string())
            .or_default()
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Make every call fail with `IndexError::Unavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), IndexError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(IndexError::Unavailable("memory index set failing".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryIndexService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexService for MemoryIndexService {
    fn service_id(&self) -> &str {
        "memory-index"
    }

    async fn resolve_pattern(
        &self,
        tenant: &str,
        pattern: &str,
    ) -> Result<Vec<String>, IndexError> {
        self.check_available()?;
        let regex = glob_to_regex(pattern)?;
        let paths = self.paths.read();
        Ok(paths
            .get(tenant)
            .map(|all| {
                all.iter()
                    .filter(|p| regex.is_match(p))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find(&self, tenant: &str, pattern: &str) -> Result<Vec<PathNode>, IndexError> {
        self.check_available()?;
        let depth = pattern.split('.').count();
        let regex = glob_to_regex(pattern)?;

        let paths = self.paths.read();
        // BTreeMap keeps find output stable for assertions
        let mut nodes: BTreeMap<String, bool> = BTreeMap::new();
        for path in paths.get(tenant).into_iter().flatten() {
            let segments: Vec<&str> = path.split('.').collect();
            if segments.len() < depth {
                continue;
            }
            let prefix = segments[..depth].join(".");
            if regex.is_match(&prefix) {
                let leaf = segments.len() == depth;
                *nodes.entry(prefix).or_insert(leaf) |= leaf;
            }
        }

        Ok(nodes
            .into_iter()
            .map(|(path, leaf)| PathNode { path, leaf })
            .collect())
    }

    async fn path_stats(&self, tenant: &str, pattern: &str) -> Result<PathStats, IndexError> {
        let nodes = self.find(tenant, pattern).await?;
        Ok(PathStats {
            total: nodes.len(),
            leaves: nodes.iter().filter(|n| n.leaf).count(),
        })
    }

    async fn shutdown(&self) {}
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Store double with programmable tiered fixture data
pub struct MemoryStoreService {
    data: RwLock<HashMap<(String, String), Vec<TierSeries>>>,
    failing: AtomicBool,
}

impl MemoryStoreService {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Seed fixture tiers for one path, returning self for chaining
    pub fn with_series(self, tenant: &str, path: &str, tiers: Vec<TierSeries>) -> Self {
        self.data
            .write()
            .insert((tenant.to_string(), path.to_string()), tiers);
        self
    }

    /// Make every fetch fail with `StoreError::Unavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for MemoryStoreService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreService for MemoryStoreService {
    fn service_id(&self) -> &str {
        "memory-store"
    }

    async fn fetch(
        &self,
        tenant: &str,
        path: &str,
        _range: TimeRange,
    ) -> Result<Vec<TierSeries>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store set failing".to_string(),
            ));
        }
        // Fixtures are built for the requested range; no clipping here
        let data = self.data.read();
        Ok(data
            .get(&(tenant.to_string(), path.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn shutdown(&self) {}
}

// =============================================================================
// Recording Stats
// =============================================================================

/// Stats sink that records every call for assertions
#[derive(Default)]
pub struct RecordingStats {
    events: Mutex<Vec<String>>,
}

impl RecordingStats {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, in call order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl StatsService for RecordingStats {
    fn record_render(&self, tenant: &str, _duration: Duration, success: bool) {
        self.events
            .lock()
            .push(format!("render:{}:{}", tenant, success));
    }

    fn record_function_call(&self, function: &str) {
        self.events.lock().push(format!("function:{}", function));
    }

    fn record_paths_resolved(&self, tenant: &str, count: usize) {
        self.events
            .lock()
            .push(format!("paths:{}:{}", tenant, count));
    }

    fn record_throttled(&self, tenant: &str, reason: &str) {
        self.events
            .lock()
            .push(format!("throttled:{}:{}", tenant, reason));
    }

    fn shutdown(&self) {
        self.events.lock().push("shutdown".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;
    use crate::types::Tier;

    #[tokio::test]
    async fn test_glob_star_matches_one_segment() {
        let index = MemoryIndexService::new().with_paths(
            "t",
            ["host.a.cpu", "host.b.cpu", "host.a.deep.cpu"],
        );

        let paths = index.resolve_pattern("t", "host.*.cpu").await.unwrap();
        assert_eq!(paths, vec!["host.a.cpu", "host.b.cpu"]);
    }

    #[tokio::test]
    async fn test_glob_braces_and_question_mark() {
        let index = MemoryIndexService::new().with_paths(
            "t",
            ["web1.load", "web2.load", "db1.load", "web10.load"],
        );

        let paths = index.resolve_pattern("t", "{web1,db1}.load").await.unwrap();
        assert_eq!(paths, vec!["web1.load", "db1.load"]);

        let paths = index.resolve_pattern("t", "web?.load").await.unwrap();
        assert_eq!(paths, vec!["web1.load", "web2.load"]);
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() {
        let index = MemoryIndexService::new().with_paths("t", ["a.b"]);
        let paths = index.resolve_pattern("t", "x.*").await.unwrap();
        assert!(paths.is_empty());

        let paths = index.resolve_pattern("other-tenant", "a.*").await.unwrap();
        assert!(paths.is_empty());
    }

    #[tokio::test]
    async fn test_find_reports_branches_and_leaves() {
        let index = MemoryIndexService::new().with_paths(
            "t",
            ["host.a.cpu", "host.a.mem", "host.b.cpu"],
        );

        let nodes = index.find("t", "host.*").await.unwrap();
        assert_eq!(
            nodes,
            vec![PathNode::branch("host.a"), PathNode::branch("host.b")]
        );

        let nodes = index.find("t", "host.a.*").await.unwrap();
        assert!(nodes.iter().all(|n| n.leaf));
        assert_eq!(nodes.len(), 2);

        let stats = index.path_stats("t", "host.*.cpu").await.unwrap();
        assert_eq!(stats, PathStats { total: 2, leaves: 2 });
    }

    #[tokio::test]
    async fn test_unterminated_brace_is_bad_pattern() {
        let index = MemoryIndexService::new().with_paths("t", ["a.b"]);
        let err = index.resolve_pattern("t", "a.{b,c").await.unwrap_err();
        assert!(matches!(err, IndexError::BadPattern { .. }));
    }

    #[tokio::test]
    async fn test_store_fetch_and_failure() {
        let series = Series::from_values("a.b", 0, 60, vec![Some(1.0)]).unwrap();
        let store = MemoryStoreService::new().with_series(
            "t",
            "a.b",
            vec![TierSeries::new(Tier(0), series)],
        );
        let range = TimeRange::new(0, 60).unwrap();

        let tiers = store.fetch("t", "a.b", range).await.unwrap();
        assert_eq!(tiers.len(), 1);

        let tiers = store.fetch("t", "missing", range).await.unwrap();
        assert!(tiers.is_empty());

        store.set_failing(true);
        assert!(store.fetch("t", "a.b", range).await.is_err());
    }
}
