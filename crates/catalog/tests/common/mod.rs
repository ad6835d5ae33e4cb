//! Shared test doubles for catalog integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use movie_catalog_core::{RankedMovie, Rating, RatingAggregate, Result as CatalogResult};
use movie_catalog_service::cache::{CacheBackend, CacheError};
use movie_catalog_service::enrichment::{BoxOfficeData, BoxOfficeProvider};
use movie_catalog_service::ranking::RankingIndex;
use movie_catalog_service::{InMemoryCatalogRepository, RatingRepository};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-process cache that records every operation
#[derive(Default)]
pub struct RecordingCache {
    entries: Mutex<HashMap<String, String>>,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub deletes: Mutex<Vec<String>>,
    pub failing: AtomicBool,
}

impl RecordingCache {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn raw_insert(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deletes.lock().clone()
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Operation("cache down".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheBackend for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.deletes.lock().push(key.to_string());
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Ranking index kept in two maps
#[derive(Default)]
pub struct MemoryRanking {
    popular: Mutex<HashMap<String, f64>>,
    top: Mutex<HashMap<String, f64>>,
    pub failing: AtomicBool,
}

impl MemoryRanking {
    pub fn popular_score(&self, title: &str) -> Option<f64> {
        self.popular.lock().get(title).copied()
    }

    pub fn top_score(&self, title: &str) -> Option<f64> {
        self.top.lock().get(title).copied()
    }

    fn highest(map: &HashMap<String, f64>, limit: usize) -> Vec<RankedMovie> {
        let mut entries: Vec<_> = map
            .iter()
            .map(|(title, score)| RankedMovie {
                title: title.clone(),
                score: *score,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap()
                .then_with(|| b.title.cmp(&a.title))
        });
        entries.truncate(limit);
        entries
    }
}

#[async_trait]
impl RankingIndex for MemoryRanking {
    async fn record(&self, title: &str, aggregate: &RatingAggregate) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Operation("ranking down".into()));
        }
        self.popular
            .lock()
            .insert(title.to_string(), aggregate.count as f64);
        if aggregate.count > 0 {
            self.top.lock().insert(title.to_string(), aggregate.average);
        }
        Ok(())
    }

    async fn top_rated(&self, limit: usize) -> Result<Vec<RankedMovie>, CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Operation("ranking down".into()));
        }
        Ok(Self::highest(&self.top.lock(), limit))
    }

    async fn most_popular(&self, limit: usize) -> Result<Vec<RankedMovie>, CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Operation("ranking down".into()));
        }
        Ok(Self::highest(&self.popular.lock(), limit))
    }
}

/// Provider returning a fixed answer, optionally after a delay
pub struct StaticProvider {
    pub response: Option<BoxOfficeData>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl StaticProvider {
    pub fn returning(response: Option<BoxOfficeData>) -> Self {
        Self {
            response,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            response: None,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BoxOfficeProvider for StaticProvider {
    async fn fetch(&self, _title: &str) -> Option<BoxOfficeData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.clone()
    }
}

/// Rating store whose next aggregate read stalls after reading
pub struct DelayedAggregates {
    inner: Arc<InMemoryCatalogRepository>,
    delay: Duration,
    armed: AtomicBool,
}

impl DelayedAggregates {
    pub fn new(inner: Arc<InMemoryCatalogRepository>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            armed: AtomicBool::new(false),
        }
    }

    /// Stall the next aggregate read only
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RatingRepository for DelayedAggregates {
    async fn upsert_rating(&self, rating: &Rating) -> CatalogResult<bool> {
        self.inner.upsert_rating(rating).await
    }

    async fn get_rating_aggregate(&self, title: &str) -> CatalogResult<RatingAggregate> {
        let aggregate = self.inner.get_rating_aggregate(title).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        Ok(aggregate)
    }
}
