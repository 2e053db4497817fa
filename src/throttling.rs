//! Admission control for query execution
//!
//! Protects the storage backend from overload by bounding concurrent and
//! windowed per-tenant query load, with an optional process-wide ceiling.
//!
//! Two layers of limiting:
//! - **Global limit**: a process-wide queries/sec ceiling shared by all
//!   tenants
//! - **Per-tenant limits**: concurrent in-flight queries and queries per
//!   fixed window, so one tenant cannot consume the whole backend
//!
//! Admission is a non-blocking guarded transition: [`ThrottlingService::try_admit`]
//! either returns a [`Permit`] or a typed rejection. No retry or queuing
//! happens here; the caller decides on the user-visible response.
//!
//! ```rust
//! use graphite_reader::throttling::{ThrottlingConfig, ThrottlingService};
//!
//! let service = ThrottlingService::new(ThrottlingConfig::default());
//! let permit = service.try_admit("tenant-a").unwrap();
//! // ... run the query ...
//! drop(permit); // in-flight slot released exactly once
//! ```

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-tenant quota, immutable after startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottlingRule {
    /// Maximum concurrent in-flight queries
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Maximum queries per window; `None` means unlimited
    #[serde(default)]
    pub max_per_window: Option<u32>,

    /// Maximum resolved paths a single query may touch; `None` means unlimited
    #[serde(default)]
    pub max_paths: Option<usize>,
}

fn default_max_concurrent() -> u32 {
    16
}

impl Default for ThrottlingRule {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_per_window: None,
            max_paths: None,
        }
    }
}

/// Throttling configuration, loaded once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottlingConfig {
    /// Master switch; when false every admission succeeds
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Fixed window length in seconds for `max_per_window` accounting
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Optional process-wide queries/sec ceiling shared by all tenants
    #[serde(default)]
    pub global_rate: Option<u32>,

    /// Rule applied to tenants without an explicit entry
    #[serde(default)]
    pub default_rule: ThrottlingRule,

    /// Per-tenant rule overrides
    #[serde(default)]
    pub tenants: HashMap<String, ThrottlingRule>,
}

fn default_enabled() -> bool {
    true
}

fn default_window_secs() -> u64 {
    1
}

impl Default for ThrottlingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            window_secs: default_window_secs(),
            global_rate: None,
            default_rule: ThrottlingRule::default(),
            tenants: HashMap::new(),
        }
    }
}

/// Rejection reasons surfaced to the request layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThrottleError {
    /// Tenant already has `max_concurrent` queries in flight
    #[error("tenant '{0}' exceeded its concurrent query limit")]
    ConcurrencyLimitExceeded(String),

    /// Tenant or process exhausted the rate quota for the current window
    #[error("tenant '{0}' exceeded its query rate limit")]
    RateLimitExceeded(String),
}

/// Mutable runtime counters backing one tenant's rule
struct TenantState {
    in_flight: u32,
    window_count: u32,
    window_start: Instant,
}

/// Shared state behind the cloneable service handle
struct Inner {
    enabled: bool,
    window: Duration,
    default_rule: ThrottlingRule,
    rules: HashMap<String, ThrottlingRule>,
    states: RwLock<HashMap<String, TenantState>>,
    global: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl Inner {
    fn with_state<T>(&self, tenant: &str, f: impl FnOnce(&mut TenantState) -> T) -> T {
        let now = Instant::now();
        let mut states = self.states.write();
        let state = states
            .entry(tenant.to_string())
            .or_insert_with(|| TenantState {
                in_flight: 0,
                window_count: 0,
                window_start: now,
            });
        f(state)
    }

    fn release(&self, tenant: &str) {
        let mut states = self.states.write();
        if let Some(state) = states.get_mut(tenant) {
            state.in_flight = state.in_flight.saturating_sub(1);
        }
    }
}

/// Per-tenant and global admission control
///
/// Cheap to clone; all clones share one set of counters. Counters live behind
/// a single `RwLock` with short read-modify-write critical sections. Rules
/// are immutable for the process lifetime.
#[derive(Clone)]
pub struct ThrottlingService {
    inner: Arc<Inner>,
}

impl ThrottlingService {
    /// Build the service from configuration
    pub fn new(config: ThrottlingConfig) -> Self {
        let global = config
            .global_rate
            .and_then(NonZeroU32::new)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));

        Self {
            inner: Arc::new(Inner {
                enabled: config.enabled,
                window: Duration::from_secs(config.window_secs.max(1)),
                default_rule: config.default_rule,
                rules: config.tenants,
                states: RwLock::new(HashMap::new()),
                global,
            }),
        }
    }

    /// The rule governing a tenant
    pub fn rule(&self, tenant: &str) -> &ThrottlingRule {
        self.inner
            .rules
            .get(tenant)
            .unwrap_or(&self.inner.default_rule)
    }

    /// Resolved-path bound for a tenant's queries, if any
    pub fn max_paths(&self, tenant: &str) -> Option<usize> {
        if self.inner.enabled {
            self.rule(tenant).max_paths
        } else {
            None
        }
    }

    /// Try to admit one query for `tenant`
    ///
    /// On success the returned [`Permit`] must be held for the lifetime of
    /// the query; dropping it releases the in-flight slot. Rejections carry
    /// the reason and are surfaced immediately, never retried here.
    pub fn try_admit(&self, tenant: &str) -> Result<Permit, ThrottleError> {
        if !self.inner.enabled {
            self.inner.with_state(tenant, |state| state.in_flight += 1);
            return Ok(Permit::new(&self.inner, tenant));
        }

        if let Some(limiter) = &self.inner.global {
            if limiter.check().is_err() {
                return Err(ThrottleError::RateLimitExceeded(tenant.to_string()));
            }
        }

        let rule = self.rule(tenant).clone();
        let window = self.inner.window;
        let admitted = self.inner.with_state(tenant, |state| {
            let now = Instant::now();
            // Lazy window reset on first admission past the boundary
            if now.duration_since(state.window_start) >= window {
                state.window_start = now;
                state.window_count = 0;
            }

            if state.in_flight >= rule.max_concurrent {
                return Err(ThrottleError::ConcurrencyLimitExceeded(tenant.to_string()));
            }
            if let Some(max) = rule.max_per_window {
                if state.window_count >= max {
                    return Err(ThrottleError::RateLimitExceeded(tenant.to_string()));
                }
            }

            state.in_flight += 1;
            state.window_count += 1;
            Ok(())
        });

        admitted.map(|()| Permit::new(&self.inner, tenant))
    }

    /// Number of queries currently in flight for a tenant
    pub fn in_flight(&self, tenant: &str) -> u32 {
        self.inner
            .states
            .read()
            .get(tenant)
            .map(|s| s.in_flight)
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for ThrottlingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottlingService")
            .field("enabled", &self.inner.enabled)
            .field("window", &self.inner.window)
            .field("tenants", &self.inner.rules.len())
            .finish()
    }
}

/// RAII admission permit
///
/// Releases the tenant's in-flight slot exactly once on drop, which also
/// covers panics and cancelled request futures.
pub struct Permit {
    inner: Arc<Inner>,
    tenant: String,
}

impl Permit {
    fn new(inner: &Arc<Inner>, tenant: &str) -> Self {
        Self {
            inner: Arc::clone(inner),
            tenant: tenant.to_string(),
        }
    }

    /// Tenant this permit was issued to
    pub fn tenant(&self) -> &str {
        &self.tenant
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.inner.release(&self.tenant);
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit")
            .field("tenant", &self.tenant)
            .finish()
    }
}
