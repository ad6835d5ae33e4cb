//! Redis-backed derived-data cache for movies and rating aggregates
//!
//! The durable store is the source of truth; everything here is disposable.
//! [`AggregateCache`] makes every operation best-effort: failures are logged
//! and behave as a miss (reads) or a no-op (writes and invalidations).
//!
//! Repopulation is guarded by per-key invalidation generations held in
//! process: a value read from the store before an invalidation is never
//! written back after it.
//!
//! Key scheme:
//! - `entity:{title}` for movies
//! - `aggregate:{title}` for rating aggregates

use async_trait::async_trait;
use movie_catalog_core::{Movie, RatingAggregate};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const PREFIX_ENTITY: &str = "entity";
const PREFIX_AGGREGATE: &str = "aggregate";

/// Error types for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache operation failed: {0}")]
    Operation(String),
}

/// Key for a cached movie
pub fn movie_key(title: &str) -> String {
    format!("{}:{}", PREFIX_ENTITY, title)
}

/// Key for a cached rating aggregate
pub fn aggregate_key(title: &str) -> String {
    format!("{}:{}", PREFIX_AGGREGATE, title)
}

/// Raw string cache with TTL
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Redis cache using a multiplexed connection manager
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect and verify the server answers `PING` within `timeout`
    ///
    /// # Errors
    /// Returns error if Redis connection cannot be established
    #[instrument(skip(url), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        info!("Initializing Redis cache connection");

        let client = Client::open(url)?;

        let manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Operation("timed out connecting to Redis".to_string()))??;

        let mut conn = manager.clone();
        tokio::time::timeout(
            timeout,
            redis::cmd("PING").query_async::<_, String>(&mut conn),
        )
        .await
        .map_err(|_| CacheError::Operation("Redis ping timed out".to_string()))??;

        info!("Redis cache initialized successfully");

        Ok(Self { manager })
    }

    /// Shared connection manager, reused by the ranking index
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    #[instrument(skip(self, value), fields(key = %key, ttl = ttl.as_secs()))]
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();

        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let count: u64 = conn.del(key).await?;
        debug!(key = %key, deleted = %count, "Cache delete");
        Ok(())
    }
}

/// Cache that stores nothing; every read is a miss
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl CacheBackend for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Number of invalidation counters; keys share a counter by hash
const GENERATION_STRIPES: usize = 64;

/// Invalidation counter observed before a store read.
///
/// A repopulation carrying a generation that an invalidation has since
/// advanced is dropped, so a read that overlapped a write cannot put the
/// pre-write value back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Typed, best-effort cache over a [`CacheBackend`]
#[derive(Clone)]
pub struct AggregateCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    generations: Arc<[AtomicU64]>,
}

impl AggregateCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        let generations: Vec<AtomicU64> =
            (0..GENERATION_STRIPES).map(|_| AtomicU64::new(0)).collect();

        Self {
            backend,
            ttl,
            generations: generations.into(),
        }
    }

    /// Cache backed by [`NoopCache`]
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopCache), Duration::from_secs(1))
    }

    pub async fn get_movie(&self, title: &str) -> Option<Movie> {
        self.get_json(&movie_key(title)).await
    }

    /// Take before reading the movie from the store
    pub fn movie_generation(&self, title: &str) -> Generation {
        self.generation(&movie_key(title))
    }

    /// Repopulate unless the movie was invalidated since `observed`
    pub async fn put_movie(&self, movie: &Movie, observed: Generation) {
        self.set_if_current(&movie_key(&movie.title), movie, observed)
            .await
    }

    pub async fn invalidate_movie(&self, title: &str) {
        self.invalidate(&movie_key(title)).await
    }

    pub async fn get_aggregate(&self, title: &str) -> Option<RatingAggregate> {
        self.get_json(&aggregate_key(title)).await
    }

    /// Take before reading the aggregate from the store
    pub fn aggregate_generation(&self, title: &str) -> Generation {
        self.generation(&aggregate_key(title))
    }

    /// Repopulate unless the aggregate was invalidated since `observed`
    pub async fn put_aggregate(
        &self,
        title: &str,
        aggregate: &RatingAggregate,
        observed: Generation,
    ) {
        self.set_if_current(&aggregate_key(title), aggregate, observed)
            .await
    }

    pub async fn invalidate_aggregate(&self, title: &str) {
        self.invalidate(&aggregate_key(title)).await
    }

    fn stripe(&self, key: &str) -> &AtomicU64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.generations.len() as u64) as usize;
        &self.generations[index]
    }

    fn generation(&self, key: &str) -> Generation {
        Generation(self.stripe(key).load(Ordering::SeqCst))
    }

    async fn set_if_current<T: Serialize>(&self, key: &str, value: &T, observed: Generation) {
        if self.generation(key) != observed {
            debug!(key = %key, "Skipping repopulation, entry invalidated during read");
            return;
        }

        self.set_json(key, value).await;

        // An invalidation that landed between the check and the write
        if self.generation(key) != observed {
            debug!(key = %key, "Removing repopulated entry invalidated during write");
            self.delete(key).await;
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = self.backend.set(key, &raw, self.ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    async fn invalidate(&self, key: &str) {
        self.stripe(key).fetch_add(1, Ordering::SeqCst);
        self.delete(key).await;
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CacheBackend for MapCache {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            Ok(self.entries.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), CacheError> {
            self.entries.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.entries.lock().remove(key);
            Ok(())
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl CacheBackend for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Operation("down".into()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Operation("down".into()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Operation("down".into()))
        }
    }

    fn movie() -> Movie {
        Movie::new(
            "Alpha",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "Drama",
        )
    }

    #[test]
    fn test_key_scheme() {
        assert_eq!(movie_key("Alpha"), "entity:Alpha");
        assert_eq!(aggregate_key("Alpha"), "aggregate:Alpha");
    }

    #[tokio::test]
    async fn test_movie_round_trip_and_invalidate() {
        let cache = AggregateCache::new(Arc::new(MapCache::default()), Duration::from_secs(900));
        let movie = movie();

        assert!(cache.get_movie("Alpha").await.is_none());
        let generation = cache.movie_generation("Alpha");
        cache.put_movie(&movie, generation).await;
        assert_eq!(cache.get_movie("Alpha").await, Some(movie));

        cache.invalidate_movie("Alpha").await;
        assert!(cache.get_movie("Alpha").await.is_none());
    }

    #[tokio::test]
    async fn test_entries_are_invalidated_independently() {
        let cache = AggregateCache::new(Arc::new(MapCache::default()), Duration::from_secs(900));
        let aggregate = RatingAggregate {
            average: 4.5,
            count: 1,
        };

        cache
            .put_movie(&movie(), cache.movie_generation("Alpha"))
            .await;
        cache
            .put_aggregate("Alpha", &aggregate, cache.aggregate_generation("Alpha"))
            .await;
        cache.invalidate_aggregate("Alpha").await;

        assert!(cache.get_aggregate("Alpha").await.is_none());
        assert!(cache.get_movie("Alpha").await.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let backend = Arc::new(MapCache::default());
        backend
            .set("aggregate:Alpha", "{not json", Duration::from_secs(1))
            .await
            .unwrap();

        let cache = AggregateCache::new(backend, Duration::from_secs(900));
        assert!(cache.get_aggregate("Alpha").await.is_none());
    }

    #[tokio::test]
    async fn test_backend_failures_are_absorbed() {
        let cache = AggregateCache::new(Arc::new(BrokenCache), Duration::from_secs(900));

        cache
            .put_movie(&movie(), cache.movie_generation("Alpha"))
            .await;
        cache.invalidate_movie("Alpha").await;
        assert!(cache.get_movie("Alpha").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let cache = AggregateCache::disabled();
        cache
            .put_movie(&movie(), cache.movie_generation("Alpha"))
            .await;
        assert!(cache.get_movie("Alpha").await.is_none());
    }

    #[tokio::test]
    async fn test_repopulation_after_invalidation_is_dropped() {
        let cache = AggregateCache::new(Arc::new(MapCache::default()), Duration::from_secs(900));
        let stale = RatingAggregate {
            average: 4.5,
            count: 1,
        };

        let observed = cache.aggregate_generation("Alpha");
        cache.invalidate_aggregate("Alpha").await;
        cache.put_aggregate("Alpha", &stale, observed).await;
        assert!(cache.get_aggregate("Alpha").await.is_none());

        let fresh = RatingAggregate {
            average: 3.5,
            count: 1,
        };
        cache
            .put_aggregate("Alpha", &fresh, cache.aggregate_generation("Alpha"))
            .await;
        assert_eq!(cache.get_aggregate("Alpha").await, Some(fresh));
    }

    #[tokio::test]
    async fn test_invalidation_during_write_removes_entry() {
        struct InvalidatingCache {
            inner: MapCache,
            cache: Mutex<Option<AggregateCache>>,
        }

        #[async_trait]
        impl CacheBackend for InvalidatingCache {
            async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
                self.inner.get(key).await
            }

            async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
                self.inner.set(key, value, ttl).await?;
                // A writer invalidates while the value is in flight
                let cache = self.cache.lock().take();
                if let Some(cache) = cache {
                    cache.stripe(key).fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }

            async fn delete(&self, key: &str) -> Result<(), CacheError> {
                self.inner.delete(key).await
            }
        }

        let backend = Arc::new(InvalidatingCache {
            inner: MapCache::default(),
            cache: Mutex::new(None),
        });
        let cache = AggregateCache::new(backend.clone(), Duration::from_secs(900));
        *backend.cache.lock() = Some(cache.clone());

        let observed = cache.movie_generation("Alpha");
        cache.put_movie(&movie(), observed).await;
        assert!(cache.get_movie("Alpha").await.is_none());
    }
}
