//! Request Coordinator
//!
//! Every cacheable read goes through [`RequestCoordinator::execute`], which
//! resolves in this order (unless `force` is set, which always dispatches):
//!
//! 1. fresh cache entry (`age < ttl`) → returned as-is
//! 2. identical call in flight → the caller joins it
//! 3. last dispatch within `throttle` and a stale entry exists → stale value
//! 4. otherwise → dispatch `producer()` and register it as the in-flight call
//!
//! Successful results replace the cache entry; failures never touch it and are
//! handed verbatim to every caller that joined the call.

use crate::options::{ExecuteOptions, Resolution, Resolved};
use futures::future::{BoxFuture, FutureExt, Shared};
use herd_foundation::{build_key, CacheKey, CoordinatorConfig};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

type SharedCall<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

// ============================================================================
// Tables
// ============================================================================

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    /// Dispatch sequence of the call that produced this value
    seq: u64,
}

struct InflightEntry<V, E> {
    seq: u64,
    call: SharedCall<V, E>,
}

struct Tables<V, E> {
    cache: HashMap<CacheKey, CacheEntry<V>>,
    inflight: HashMap<CacheKey, InflightEntry<V, E>>,
    /// Last dispatch time per key
    activity: HashMap<CacheKey, Instant>,
    next_seq: u64,
    stats: Counters,
}

impl<V, E> Default for Tables<V, E> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            inflight: HashMap::new(),
            activity: HashMap::new(),
            next_seq: 0,
            stats: Counters::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    hits: u64,
    joins: u64,
    throttled: u64,
    dispatches: u64,
    failures: u64,
}

/// Snapshot of coordinator activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub hits: u64,
    pub joins: u64,
    pub throttled: u64,
    pub dispatches: u64,
    pub failures: u64,
    /// Cache entries currently held, expired ones included
    pub cached_entries: usize,
    pub inflight: usize,
}

struct Inner<V, E> {
    tables: Mutex<Tables<V, E>>,
    defaults: ExecuteOptions,
}

enum Step<V, E> {
    Ready(V, Resolution),
    Wait(SharedCall<V, E>, Resolution),
}

// ============================================================================
// RequestCoordinator
// ============================================================================

/// TTL cache + dispatch throttle + in-flight de-duplication for one
/// application session.
///
/// Cloning is cheap and clones share the same tables. Independent instances
/// share nothing, so tests can create as many as they like.
///
/// Dispatched calls are driven on the tokio runtime, so a call keeps running
/// (and still populates the cache) when every caller awaiting it is dropped.
pub struct RequestCoordinator<V, E> {
    inner: Arc<Inner<V, E>>,
}

/// Coordinator for untyped JSON endpoints
pub type JsonCoordinator<E> = RequestCoordinator<Value, E>;

impl<V, E> Clone for RequestCoordinator<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> Default for RequestCoordinator<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> RequestCoordinator<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_defaults(ExecuteOptions::default())
    }

    pub fn with_config(config: &CoordinatorConfig) -> Self {
        Self::with_defaults(ExecuteOptions::from(config))
    }

    /// Options used by [`fetch`](Self::fetch); `force` is ignored here.
    pub fn with_defaults(defaults: ExecuteOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                defaults: defaults.with_force(false),
            }),
        }
    }

    /// Default options, handy as a builder base: `coordinator.options().force()`
    pub fn options(&self) -> ExecuteOptions {
        self.inner.defaults
    }

    // ========================================================================
    // Execute
    // ========================================================================

    /// Resolve a request through cache, in-flight join, throttle or dispatch.
    pub async fn execute<F, Fut>(
        &self,
        endpoint: &str,
        payload: &Value,
        producer: F,
        options: ExecuteOptions,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.execute_traced(endpoint, payload, producer, options)
            .await
            .map(|resolved| resolved.value)
    }

    /// [`execute`](Self::execute) with the coordinator's default options
    pub async fn fetch<F, Fut>(&self, endpoint: &str, payload: &Value, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.execute(endpoint, payload, producer, self.inner.defaults)
            .await
    }

    /// Like [`execute`](Self::execute), but also reports which path served
    /// the value.
    pub async fn execute_traced<F, Fut>(
        &self,
        endpoint: &str,
        payload: &Value,
        producer: F,
        options: ExecuteOptions,
    ) -> Result<Resolved<V>, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let key = build_key(endpoint, payload);

        match self.resolve(key, producer, options) {
            Step::Ready(value, resolution) => Ok(Resolved { value, resolution }),
            Step::Wait(call, resolution) => call.await.map(|value| Resolved { value, resolution }),
        }
    }

    fn resolve<F, Fut>(&self, key: CacheKey, producer: F, options: ExecuteOptions) -> Step<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let now = Instant::now();
        let mut guard = self.inner.tables.lock();
        let tables = &mut *guard;

        if !options.force {
            // 1. fresh cache
            if let Some(entry) = tables.cache.get(&key) {
                if now.saturating_duration_since(entry.stored_at) < options.ttl {
                    tables.stats.hits += 1;
                    trace!(%key, "cache hit");
                    return Step::Ready(entry.value.clone(), Resolution::CacheHit);
                }
            }

            // 2. join in-flight call
            if let Some(inflight) = tables.inflight.get(&key) {
                tables.stats.joins += 1;
                trace!(%key, seq = inflight.seq, "joining in-flight call");
                return Step::Wait(inflight.call.clone(), Resolution::Joined);
            }

            // 3. throttle window with a stale value
            let throttled = tables
                .activity
                .get(&key)
                .is_some_and(|last| now.saturating_duration_since(*last) < options.throttle);
            if throttled {
                if let Some(entry) = tables.cache.get(&key) {
                    tables.stats.throttled += 1;
                    debug!(%key, "throttled, serving stale value");
                    return Step::Ready(entry.value.clone(), Resolution::Throttled);
                }
            }
        }

        // 4. dispatch
        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables.activity.insert(key.clone(), now);
        tables.stats.dispatches += 1;

        let call = self.dispatch(key.clone(), seq, producer);
        let previous = tables.inflight.insert(
            key.clone(),
            InflightEntry {
                seq,
                call: call.clone(),
            },
        );
        drop(guard);

        match previous {
            Some(previous) => debug!(
                %key,
                seq,
                superseded = previous.seq,
                force = options.force,
                "dispatch"
            ),
            None => debug!(%key, seq, force = options.force, "dispatch"),
        }

        tokio::spawn(call.clone());
        Step::Wait(call, Resolution::Dispatched)
    }

    fn dispatch<F, Fut>(&self, key: CacheKey, seq: u64, producer: F) -> SharedCall<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let inner: Weak<Inner<V, E>> = Arc::downgrade(&self.inner);

        // The producer runs on first poll, never under the table lock.
        async move {
            let outcome = AssertUnwindSafe(async move { producer().await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(result) => {
                    if let Some(inner) = inner.upgrade() {
                        inner.settle(&key, seq, &result);
                    }
                    result
                }
                Err(panic) => {
                    if let Some(inner) = inner.upgrade() {
                        inner.abandon(&key, seq);
                    }
                    std::panic::resume_unwind(panic)
                }
            }
        }
        .boxed()
        .shared()
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Drop the cached value and dispatch history for one request, so the
    /// next call dispatches. An in-flight call is left alone.
    pub fn invalidate(&self, endpoint: &str, payload: &Value) -> bool {
        let key = build_key(endpoint, payload);
        let mut tables = self.inner.tables.lock();
        tables.activity.remove(&key);
        tables.cache.remove(&key).is_some()
    }

    /// Drop every cached value and dispatch record. In-flight calls still
    /// settle and repopulate their keys.
    pub fn clear(&self) {
        let mut tables = self.inner.tables.lock();
        tables.cache.clear();
        tables.activity.clear();
    }

    /// Remove entries whose value and last dispatch are both older than
    /// `older_than`.
    ///
    /// With `older_than` at least as long as every ttl and throttle window in
    /// use, this changes nothing callers can observe. Returns the number of
    /// cache entries removed.
    pub fn sweep_expired(&self, older_than: Duration) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.tables.lock();
        let tables = &mut *guard;

        let activity = &tables.activity;
        let inflight = &tables.inflight;
        let before = tables.cache.len();
        tables.cache.retain(|key, entry| {
            let value_old = now.saturating_duration_since(entry.stored_at) >= older_than;
            let dispatch_old = activity
                .get(key)
                .map_or(true, |last| now.saturating_duration_since(*last) >= older_than);
            !(value_old && dispatch_old && !inflight.contains_key(key))
        });
        let removed = before - tables.cache.len();

        let cache = &tables.cache;
        let inflight = &tables.inflight;
        tables.activity.retain(|key, last| {
            cache.contains_key(key)
                || inflight.contains_key(key)
                || now.saturating_duration_since(*last) < older_than
        });

        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Cached value for a request regardless of age
    pub fn cached(&self, endpoint: &str, payload: &Value) -> Option<V> {
        let key = build_key(endpoint, payload);
        self.inner
            .tables
            .lock()
            .cache
            .get(&key)
            .map(|entry| entry.value.clone())
    }

    pub fn is_inflight(&self, endpoint: &str, payload: &Value) -> bool {
        let key = build_key(endpoint, payload);
        self.inner.tables.lock().inflight.contains_key(&key)
    }

    pub fn stats(&self) -> CoordinatorStats {
        let tables = self.inner.tables.lock();
        CoordinatorStats {
            hits: tables.stats.hits,
            joins: tables.stats.joins,
            throttled: tables.stats.throttled,
            dispatches: tables.stats.dispatches,
            failures: tables.stats.failures,
            cached_entries: tables.cache.len(),
            inflight: tables.inflight.len(),
        }
    }
}

impl<V: Clone, E> Inner<V, E> {
    /// The producer panicked: release the key so the next call dispatches
    /// afresh instead of joining a poisoned call.
    fn abandon(&self, key: &CacheKey, seq: u64) {
        let mut tables = self.tables.lock();
        if tables.inflight.get(key).is_some_and(|entry| entry.seq == seq) {
            tables.inflight.remove(key);
        }
        tables.stats.failures += 1;
        warn!(%key, seq, "producer panicked, in-flight entry released");
    }

    fn settle(&self, key: &CacheKey, seq: u64, result: &Result<V, E>) {
        let mut guard = self.tables.lock();
        let tables = &mut *guard;

        // A forced call may have replaced this entry; only remove our own.
        if tables.inflight.get(key).is_some_and(|entry| entry.seq == seq) {
            tables.inflight.remove(key);
        }

        match result {
            Ok(value) => {
                let newer_stored = tables.cache.get(key).is_some_and(|entry| entry.seq > seq);
                if newer_stored {
                    trace!(%key, seq, "result older than cached value, not stored");
                } else {
                    tables.cache.insert(
                        key.clone(),
                        CacheEntry {
                            value: value.clone(),
                            stored_at: Instant::now(),
                            seq,
                        },
                    );
                    trace!(%key, seq, "stored");
                }
            }
            Err(_) => {
                tables.stats.failures += 1;
                debug!(%key, seq, "call failed, cache untouched");
            }
        }
    }
}
