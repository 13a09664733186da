// src/source/memo.rs

//! Memoizing fetch protocol.
//!
//! Every request is registered in the source's [`RecencyCache`] as a shared,
//! not-yet-settled future *before* control returns to the caller, so a second
//! identical request arriving while the first is in flight awaits the same
//! future instead of starting another fetch. A request that fails removes its
//! own entry again, so the failure is never replayed from the cache.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::RecencyCache;
use crate::errors::Result;
use crate::source::{FetchResult, Provider, SourceAdapter};
use crate::types::{Options, Records, SourceName};

/// Handle to a fetch that may still be in flight. Awaiting it yields a fresh
/// clone of the settled result.
pub type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Clone)]
struct InFlight {
    /// Distinguishes this request from a later one stored under the same key.
    attempt: u64,
    fetch: SharedFetch,
}

type FetchCache = RecencyCache<String, InFlight, Value>;

/// A [`SourceAdapter`] wrapped with its own recency cache.
pub struct MemoizedSource<A> {
    name: SourceName,
    adapter: Arc<A>,
    cache: Arc<Mutex<FetchCache>>,
    attempts: AtomicU64,
}

impl<A> fmt::Debug for MemoizedSource<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizedSource")
            .field("name", &self.name)
            .field("cached", &lock(&self.cache).len())
            .finish_non_exhaustive()
    }
}

impl<A: SourceAdapter> MemoizedSource<A> {
    /// Wrap `adapter`, caching up to `capacity` distinct requests.
    /// A capacity of zero disables memoization.
    pub fn new(name: impl Into<SourceName>, adapter: A, capacity: usize) -> Self {
        Self::with_cache(name.into(), adapter, RecencyCache::new(capacity))
    }

    /// Like [`MemoizedSource::new`] but rejects negative capacities.
    pub fn try_new(name: impl Into<SourceName>, adapter: A, capacity: i64) -> Result<Self> {
        Ok(Self::with_cache(
            name.into(),
            adapter,
            RecencyCache::try_new(capacity)?,
        ))
    }

    fn with_cache(name: SourceName, adapter: A, cache: FetchCache) -> Self {
        Self {
            name,
            adapter: Arc::new(adapter),
            cache: Arc::new(Mutex::new(cache)),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Number of requests currently memoized (settled or in flight).
    pub fn cached_len(&self) -> usize {
        lock(&self.cache).len()
    }

    pub fn is_cached(&self, key: &str) -> bool {
        lock(&self.cache).has(key)
    }

    /// Drop one memoized request. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = lock(&self.cache).remove(key).is_some();
        if removed {
            debug!(source = %self.name, key = %key, "invalidated cached request");
        }
        removed
    }

    pub fn clear_cache(&self) {
        lock(&self.cache).clear();
        debug!(source = %self.name, "cleared request cache");
    }

    /// Return the memoized fetch for `options`, registering a new one on a
    /// miss. Registration happens before this function returns.
    pub fn memoized_fetch(&self, options: &Options) -> SharedFetch {
        let Some(key) = self.adapter.cache_key(options) else {
            debug!(source = %self.name, "request bypasses cache");
            return self.start_fetch(options.clone(), None);
        };

        let mut cache = lock(&self.cache);

        if let Some(hit) = cache.get(&key) {
            debug!(source = %self.name, key = %key, "cache hit");
            return hit.fetch.clone();
        }

        let covering = cache
            .find(|entry| {
                entry
                    .metadata()
                    .is_some_and(|meta| self.adapter.covers(meta, options))
            })
            .map(|entry| entry.value().fetch.clone());
        if let Some(fetch) = covering {
            debug!(source = %self.name, key = %key, "covering cache entry found");
            return fetch;
        }

        debug!(source = %self.name, key = %key, "cache miss; starting fetch");
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
        let fetch = self.start_fetch(options.clone(), Some((key.clone(), attempt)));
        cache.add(
            key,
            InFlight {
                attempt,
                fetch: fetch.clone(),
            },
            self.adapter.cache_metadata(options),
        );
        fetch
    }

    fn start_fetch(&self, options: Options, slot: Option<(String, u64)>) -> SharedFetch {
        let adapter = Arc::clone(&self.adapter);
        let cache = Arc::clone(&self.cache);
        let source = self.name.clone();

        async move {
            let result = match adapter.fetch_raw(&options).await {
                Ok(raw) => adapter.normalize(raw, &options),
                Err(err) => Err(err),
            };

            if let Err(err) = &result {
                if let Some((key, attempt)) = &slot {
                    let mut cache = lock(&cache);
                    // Only our own entry; the key may have been re-registered.
                    if cache.peek(key).is_some_and(|f| f.attempt == *attempt) {
                        cache.remove(key);
                    }
                }
                warn!(source = %source, error = %err, "fetch failed; dropped from cache");
            }

            result
        }
        .boxed()
        .shared()
    }
}

impl<A: SourceAdapter> Provider for MemoizedSource<A> {
    fn fetch(&self, options: Options, prior: Vec<Records>) -> BoxFuture<'_, FetchResult> {
        let request = self.adapter.request_options(&options, &prior);
        let pending = self.memoized_fetch(&request);

        async move {
            // Each awaiter of a shared fetch receives its own clone, so the
            // steps below never touch the cached value.
            let mut records = pending.await?;
            self.adapter.annotate(&mut records, &request);
            self.adapter.post_process(records, &request, &prior)
        }
        .boxed()
    }
}

fn lock(cache: &Mutex<FetchCache>) -> MutexGuard<'_, FetchCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}
