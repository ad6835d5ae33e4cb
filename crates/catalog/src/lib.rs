//! # Movie Catalog Service
//!
//! Movies, ratings, rankings and box-office enrichment over a PostgreSQL
//! source of truth with an optional Redis cache.

pub mod cache;
pub mod config;
pub mod enrichment;
pub mod handlers;
pub mod memory;
pub mod ranking;
pub mod repository;
pub mod service;

pub use cache::{AggregateCache, CacheBackend, CacheError, NoopCache, RedisCache};
pub use config::{BoxOfficeConfig, CatalogConfig};
pub use enrichment::{
    merge_box_office, BoxOfficeClient, BoxOfficeData, BoxOfficeProvider, DisabledBoxOffice,
    EnrichmentError,
};
pub use handlers::{configure_routes, ApiError, AppState};
pub use memory::InMemoryCatalogRepository;
pub use ranking::{NoopRankingIndex, RankingIndex, RedisRankingIndex};
pub use repository::{MovieRepository, PostgresCatalogRepository, RatingRepository};
pub use service::CatalogService;

use movie_catalog_core::DatabasePool;
use std::sync::Arc;
use tracing::{info, warn};

/// Initialize catalog service components
///
/// PostgreSQL is required and migrated on startup. Redis and the box-office
/// provider are optional: when unconfigured or unreachable the service runs
/// with the no-op cache, ranking index and provider.
pub async fn init_service(config: &CatalogConfig) -> anyhow::Result<Arc<CatalogService>> {
    // Initialize database pool
    let db_pool = DatabasePool::new(&config.database).await?;
    let repository = Arc::new(PostgresCatalogRepository::new(db_pool.pool().clone()));
    repository.migrate().await?;

    let mut service = CatalogService::new(repository.clone(), repository);

    // Initialize Redis cache and ranking index
    match &config.redis.url {
        Some(url) => match RedisCache::connect(url, config.redis.connection_timeout).await {
            Ok(redis) => {
                let ranking = RedisRankingIndex::new(redis.connection());
                service = service
                    .with_cache(AggregateCache::new(Arc::new(redis), config.redis.cache_ttl))
                    .with_ranking(Arc::new(ranking));
                info!("Redis cache and ranking index enabled");
            }
            Err(e) => warn!(error = %e, "Redis unreachable, running without cache"),
        },
        None => info!("Redis not configured, running without cache"),
    }

    // Initialize box office enrichment
    match BoxOfficeClient::from_config(&config.box_office)? {
        Some(client) => {
            service = service
                .with_box_office(Arc::new(client), config.box_office.enrichment_timeout);
            info!("Box office enrichment enabled");
        }
        None => info!("Box office provider not configured, enrichment disabled"),
    }

    Ok(Arc::new(service))
}
