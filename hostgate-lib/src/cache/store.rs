use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use url::Url;

use crate::cache::{Clock, Fingerprint, SystemClock};
use crate::types::{CacheParams, CachedResponse, RequestOptions, Response, Result};

/// Problems reading the cache. They never reach the caller; a failed read
/// counts as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The value identifying the request could not be serialized
    #[error("Cannot compute cache fingerprint: {0}")]
    Fingerprint(#[source] serde_json::Error),

    /// The entry was stored later than the current clock time
    #[error("Cache entry is {0:?} in the future")]
    ClockSkew(Duration),
}

/// A stored snapshot with the time it was stored
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The trimmed response
    pub snapshot: CachedResponse,
    /// When the snapshot was stored
    pub created_at: SystemTime,
}

impl CacheEntry {
    /// Age of the entry at `now`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ClockSkew`] if `now` is before the entry was
    /// created.
    pub fn age(&self, now: SystemTime) -> std::result::Result<Duration, CacheError> {
        now.duration_since(self.created_at)
            .map_err(|err| CacheError::ClockSkew(err.duration()))
    }
}

/// Result of looking up a fingerprint
#[derive(Debug)]
pub enum Lookup {
    /// A fresh entry
    Hit {
        /// The stored snapshot
        snapshot: CachedResponse,
        /// Age of the entry
        age: Duration,
    },
    /// An entry older than the expiry
    Expired {
        /// Age of the entry
        age: Duration,
    },
    /// No entry at all
    Missing,
    /// The entry could not be read
    Failed(CacheError),
}

/// Counters of cache events
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    errors: AtomicU64,
    stores: AtomicU64,
}

impl CacheStats {
    /// Lookups answered from the cache
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups without any entry
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Lookups that found a stale entry
    #[must_use]
    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }

    /// Lookups that failed and were treated as a miss
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Snapshots written
    #[must_use]
    pub fn stores(&self) -> u64 {
        self.stores.load(Ordering::Relaxed)
    }

    /// Share of lookups answered from the cache, between 0 and 1
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses() + self.expired() + self.errors();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// In-memory response cache with a per-lookup time to live.
///
/// Entries are never evicted; an expired entry stays until the next
/// successful fetch for its fingerprint overwrites it.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ResponseCache {
    /// Create an empty cache reading time from `clock`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            stats: CacheStats::default(),
        }
    }

    /// Look up a fingerprint without touching any counters
    #[must_use]
    pub fn lookup(&self, fingerprint: &Fingerprint, expire: Duration) -> Lookup {
        let Some(entry) = self.entries.get(fingerprint) else {
            return Lookup::Missing;
        };

        match entry.age(self.clock.now()) {
            Ok(age) if age < expire => Lookup::Hit {
                snapshot: entry.snapshot.clone(),
                age,
            },
            Ok(age) => Lookup::Expired { age },
            Err(err) => Lookup::Failed(err),
        }
    }

    /// Store a snapshot, replacing any earlier entry
    pub fn store(&self, fingerprint: Fingerprint, snapshot: CachedResponse) {
        let entry = CacheEntry {
            snapshot,
            created_at: self.clock.now(),
        };
        self.entries.insert(fingerprint, entry);
        self.stats.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Serve a request from the cache, or run `fetch` and cache its result.
    ///
    /// A hit returns the stored snapshot tagged with its fingerprint. On a
    /// miss the fetched response is stored and returned untagged. Errors from
    /// `fetch` are returned as is and nothing is stored.
    ///
    /// # Errors
    ///
    /// Only errors returned by `fetch`.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        url: &Url,
        options: &RequestOptions,
        params: &CacheParams,
        fetch: F,
    ) -> Result<CachedResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response>>,
    {
        let fingerprint = match Fingerprint::new(url, params.cache_by.as_ref(), options) {
            Ok(fingerprint) => Some(fingerprint),
            Err(err) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("CACHE ERROR :: {err} :: {url}");
                None
            }
        };

        if let Some(fingerprint) = &fingerprint {
            if let Some(snapshot) = self.read(url, fingerprint, params.expire) {
                return Ok(snapshot.tagged(fingerprint.clone()));
            }
        }

        let response = fetch().await?;
        let snapshot = CachedResponse::from(&response);

        if let Some(fingerprint) = fingerprint {
            log::debug!("CACHE SAVED :: {url} :: {fingerprint}");
            self.store(fingerprint, snapshot.clone());
        }

        Ok(snapshot)
    }

    /// Look up, log and count
    fn read(&self, url: &Url, fingerprint: &Fingerprint, expire: Duration) -> Option<CachedResponse> {
        let expire_secs = expire.as_secs();
        match self.lookup(fingerprint, expire) {
            Lookup::Hit { snapshot, age } => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "FROM CACHE :: {}/{expire_secs} seconds :: {url} :: {fingerprint}",
                    age.as_secs()
                );
                Some(snapshot)
            }
            Lookup::Expired { age } => {
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "CACHE EXPIRED :: {}/{expire_secs} seconds :: {url} :: {fingerprint}",
                    age.as_secs()
                );
                None
            }
            Lookup::Missing => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                log::debug!("CACHE NOT FOUND :: {url} :: {fingerprint}");
                None
            }
            Lookup::Failed(err) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("CACHE ERROR :: {err} :: {url} :: {fingerprint}");
                None
            }
        }
    }

    /// Event counters
    #[must_use]
    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of stored entries, expired ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing was stored yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::cache::ManualClock;
    use crate::types::Timings;
    use http::{HeaderMap, Method, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn url() -> Url {
        Url::parse("https://api.example.com/items").unwrap()
    }

    fn response(body: &str) -> Response {
        Response {
            url: url(),
            method: Method::GET,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.to_string(),
            remote_addr: None,
            timings: Timings::default(),
        }
    }

    fn cache() -> (ResponseCache, ManualClock) {
        let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000));
        (ResponseCache::new(Arc::new(clock.clone())), clock)
    }

    /// Fetch through the cache, counting how often the fetcher runs
    async fn fetch(
        cache: &ResponseCache,
        calls: &AtomicUsize,
        options: &RequestOptions,
        params: &CacheParams,
    ) -> CachedResponse {
        cache
            .get_or_fetch(&url(), options, params, move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(response(&format!("fetch {n}")))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_hit_within_ttl() {
        let (cache, clock) = cache();
        let calls = AtomicUsize::new(0);
        let params = CacheParams::default().expire(Duration::from_secs(60));
        let options = RequestOptions::new();

        let first = fetch(&cache, &calls, &options, &params).await;
        assert!(!first.is_cached());

        clock.advance(Duration::from_secs(59));
        let second = fetch(&cache, &calls, &options, &params).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(second.is_cached());
        assert_eq!(second.body, first.body);
        assert_eq!(second.status, first.status);
        assert_eq!(second.headers, first.headers);
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[tokio::test]
    async fn test_refetch_after_ttl() {
        let (cache, clock) = cache();
        let calls = AtomicUsize::new(0);
        let params = CacheParams::default().expire(Duration::from_secs(60));
        let options = RequestOptions::new();

        fetch(&cache, &calls, &options, &params).await;
        clock.advance(Duration::from_secs(60));
        let refreshed = fetch(&cache, &calls, &options, &params).await;
        assert_eq!(refreshed.body, "fetch 2");
        assert!(!refreshed.is_cached());

        // The new entry is fresh again
        let cached = fetch(&cache, &calls, &options, &params).await;
        assert_eq!(cached.body, "fetch 2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_by_groups_requests() {
        let (cache, _clock) = cache();
        let calls = AtomicUsize::new(0);
        let params = CacheParams::default().cache_by(json!("items"));

        let a = RequestOptions::new().timeout(Duration::from_secs(1));
        let b = RequestOptions::new().timeout(Duration::from_secs(2));
        fetch(&cache, &calls, &a, &params).await;
        let second = fetch(&cache, &calls, &b, &params).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(second.is_cached());
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (cache, _clock) = cache();
        let params = CacheParams::default();
        let options = RequestOptions::new();

        let result = cache
            .get_or_fetch(&url(), &options, &params, || async {
                Err(ErrorKind::InvalidUrlHost)
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());

        let calls = AtomicUsize::new(0);
        fetch(&cache, &calls, &options, &params).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clock_skew_counts_as_miss() {
        let (cache, clock) = cache();
        let calls = AtomicUsize::new(0);
        let params = CacheParams::default();
        let options = RequestOptions::new();

        fetch(&cache, &calls, &options, &params).await;
        clock.rewind(Duration::from_secs(30));

        let fingerprint = Fingerprint::new(&url(), None, &options).unwrap();
        assert!(matches!(
            cache.lookup(&fingerprint, params.expire),
            Lookup::Failed(CacheError::ClockSkew(skew)) if skew == Duration::from_secs(30)
        ));

        let refetched = fetch(&cache, &calls, &options, &params).await;
        assert_eq!(refetched.body, "fetch 2");
        assert_eq!(cache.stats().errors(), 1);
    }

    #[test]
    fn test_lookup_missing() {
        let (cache, _clock) = cache();
        let fingerprint = Fingerprint::new(&url(), None, &RequestOptions::new()).unwrap();
        assert!(matches!(
            cache.lookup(&fingerprint, Duration::from_secs(1)),
            Lookup::Missing
        ));
        assert!((cache.stats().hit_rate() - 0.0).abs() < f64::EPSILON);
    }
}
