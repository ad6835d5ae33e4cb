//! Ranking indexes over movie titles
//!
//! Two sorted sets, kept eventually consistent with the durable rating
//! aggregates:
//! - `rank:movies:popular` scored by rating count
//! - `rank:movies:top` scored by rounded average rating

use async_trait::async_trait;
use movie_catalog_core::{RankedMovie, RatingAggregate};
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::{debug, instrument};

use crate::cache::CacheError;

/// Sorted set scored by rating count
pub const POPULAR_KEY: &str = "rank:movies:popular";

/// Sorted set scored by average rating
pub const TOP_RATED_KEY: &str = "rank:movies:top";

#[async_trait]
pub trait RankingIndex: Send + Sync {
    /// Push the scores derived from `aggregate` for `title` (upsert by member)
    async fn record(&self, title: &str, aggregate: &RatingAggregate) -> Result<(), CacheError>;

    /// Highest average ratings first
    async fn top_rated(&self, limit: usize) -> Result<Vec<RankedMovie>, CacheError>;

    /// Highest rating counts first
    async fn most_popular(&self, limit: usize) -> Result<Vec<RankedMovie>, CacheError>;
}

/// Redis sorted-set ranking index
#[derive(Clone)]
pub struct RedisRankingIndex {
    manager: ConnectionManager,
}

impl RedisRankingIndex {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    async fn highest(&self, key: &str, limit: usize) -> Result<Vec<RankedMovie>, CacheError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.manager.clone();
        let stop = isize::try_from(limit - 1).unwrap_or(isize::MAX);
        let entries: Vec<(String, f64)> = conn.zrevrange_withscores(key, 0, stop).await?;

        Ok(entries
            .into_iter()
            .map(|(title, score)| RankedMovie { title, score })
            .collect())
    }
}

#[async_trait]
impl RankingIndex for RedisRankingIndex {
    #[instrument(skip(self, aggregate), fields(title = %title, count = aggregate.count))]
    async fn record(&self, title: &str, aggregate: &RatingAggregate) -> Result<(), CacheError> {
        let mut pipe = redis::pipe();
        pipe.zadd(POPULAR_KEY, title, aggregate.count).ignore();

        if aggregate.count > 0 {
            pipe.zadd(TOP_RATED_KEY, title, aggregate.average).ignore();
        }

        let mut conn = self.manager.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;

        debug!(title = %title, "Ranking scores updated");
        Ok(())
    }

    async fn top_rated(&self, limit: usize) -> Result<Vec<RankedMovie>, CacheError> {
        self.highest(TOP_RATED_KEY, limit).await
    }

    async fn most_popular(&self, limit: usize) -> Result<Vec<RankedMovie>, CacheError> {
        self.highest(POPULAR_KEY, limit).await
    }
}

/// Ranking index that records nothing and ranks nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRankingIndex;

#[async_trait]
impl RankingIndex for NoopRankingIndex {
    async fn record(&self, _title: &str, _aggregate: &RatingAggregate) -> Result<(), CacheError> {
        Ok(())
    }

    async fn top_rated(&self, _limit: usize) -> Result<Vec<RankedMovie>, CacheError> {
        Ok(Vec::new())
    }

    async fn most_popular(&self, _limit: usize) -> Result<Vec<RankedMovie>, CacheError> {
        Ok(Vec::new())
    }
}
