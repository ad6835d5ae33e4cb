//! Catalog use cases
//!
//! Writes go to the durable repository first, then invalidate the affected
//! cache entries and refresh the ranking scores. Reads consult the cache,
//! fall back to the repository and repopulate. Cache, ranking and enrichment
//! failures never fail a request.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use movie_catalog_core::pagination::{
    decode_scoped_cursor, effective_limit, encode_scoped_cursor, filter_fingerprint,
};
use movie_catalog_core::validation::{
    validate_create_movie, validate_rater_id, validate_rating,
};
use movie_catalog_core::{
    CatalogError, CreateMovieRequest, Movie, MovieFilter, MoviePage, RankedMovie, Rating,
    RatingAggregate, RatingSubmission, Result,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::cache::AggregateCache;
use crate::enrichment::{merge_box_office, BoxOfficeProvider, DisabledBoxOffice};
use crate::ranking::{NoopRankingIndex, RankingIndex};
use crate::repository::{MovieRepository, RatingRepository};

/// Default bound on the enrichment step of a movie creation
pub const DEFAULT_ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Titles share a ranking refresh lock by hash
const RANKING_LOCK_STRIPES: usize = 64;

pub struct CatalogService {
    movies: Arc<dyn MovieRepository>,
    ratings: Arc<dyn RatingRepository>,
    cache: AggregateCache,
    ranking: Arc<dyn RankingIndex>,
    box_office: Arc<dyn BoxOfficeProvider>,
    enrichment_timeout: Duration,
    ranking_locks: Vec<Mutex<()>>,
}

impl CatalogService {
    /// Service with no cache, no ranking index and no enrichment
    pub fn new(movies: Arc<dyn MovieRepository>, ratings: Arc<dyn RatingRepository>) -> Self {
        Self {
            movies,
            ratings,
            cache: AggregateCache::disabled(),
            ranking: Arc::new(NoopRankingIndex),
            box_office: Arc::new(DisabledBoxOffice),
            enrichment_timeout: DEFAULT_ENRICHMENT_TIMEOUT,
            ranking_locks: (0..RANKING_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn with_cache(mut self, cache: AggregateCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_ranking(mut self, ranking: Arc<dyn RankingIndex>) -> Self {
        self.ranking = ranking;
        self
    }

    /// Enable enrichment, bounding the whole step (retries included) by `timeout`
    pub fn with_box_office(
        mut self,
        provider: Arc<dyn BoxOfficeProvider>,
        timeout: Duration,
    ) -> Self {
        self.box_office = provider;
        self.enrichment_timeout = timeout;
        self
    }

    /// Validate, enrich and persist a new movie.
    ///
    /// Enrichment failures and timeouts leave `boxOffice` empty; they never
    /// fail the creation.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_movie(&self, request: CreateMovieRequest) -> Result<Movie> {
        let release_date = validate_create_movie(&request)?;

        let mut movie = Movie::new(request.title, release_date, request.genre);
        movie.distributor = request.distributor;
        movie.budget = request.budget;
        movie.mpa_rating = request.mpa_rating;

        match tokio::time::timeout(self.enrichment_timeout, self.box_office.fetch(&movie.title))
            .await
        {
            Ok(Some(data)) => merge_box_office(&mut movie, data),
            Ok(None) => debug!("Creating movie without box office data"),
            Err(_) => warn!(
                timeout_ms = self.enrichment_timeout.as_millis() as u64,
                "Box office enrichment timed out"
            ),
        }

        self.movies.create_movie(&movie).await?;
        self.cache.invalidate_movie(&movie.title).await;

        info!(id = %movie.id, enriched = movie.box_office.is_some(), "Movie created");
        Ok(movie)
    }

    /// Movie by title, served from cache when possible
    #[instrument(skip(self))]
    pub async fn get_movie(&self, title: &str) -> Result<Movie> {
        if let Some(movie) = self.cache.get_movie(title).await {
            return Ok(movie);
        }

        let generation = self.cache.movie_generation(title);
        let movie = self.movies.get_movie_by_title(title).await?;
        self.cache.put_movie(&movie, generation).await;
        Ok(movie)
    }

    /// One page of movies matching `filter`.
    ///
    /// `cursor` must come from a previous page of the same filter.
    #[instrument(skip(self, cursor))]
    pub async fn list_movies(
        &self,
        filter: MovieFilter,
        limit: Option<i64>,
        cursor: Option<&str>,
    ) -> Result<MoviePage> {
        let limit = effective_limit(limit);
        let fingerprint = filter_fingerprint(&filter.normalized())?;

        let offset = match cursor.filter(|c| !c.is_empty()) {
            Some(cursor) => decode_scoped_cursor(cursor, &fingerprint)?,
            None => 0,
        };

        let mut items = self.movies.list_movies(&filter, limit, offset).await?;

        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            Some(encode_scoped_cursor(
                offset.saturating_add(limit as u64),
                &fingerprint,
            ))
        } else {
            None
        };

        Ok(MoviePage { items, next_cursor })
    }

    /// Replace the mutable fields of an existing movie.
    ///
    /// The title is the business key and cannot change; id and box-office
    /// snapshot are kept.
    #[instrument(skip(self, request))]
    pub async fn update_movie(&self, title: &str, mut request: CreateMovieRequest) -> Result<Movie> {
        if request.title.is_empty() {
            request.title = title.to_string();
        } else if request.title != title {
            return Err(CatalogError::invalid("title", "title cannot be changed"));
        }

        let release_date = validate_create_movie(&request)?;
        let existing = self.movies.get_movie_by_title(title).await?;

        let movie = Movie {
            id: existing.id,
            title: existing.title,
            release_date,
            genre: request.genre,
            distributor: request.distributor,
            budget: request.budget,
            mpa_rating: request.mpa_rating,
            box_office: existing.box_office,
        };

        self.movies.update_movie(&movie).await?;
        self.cache.invalidate_movie(&movie.title).await;

        info!(id = %movie.id, "Movie updated");
        Ok(movie)
    }

    /// Create or replace `rater_id`'s rating for `title`
    #[instrument(skip(self))]
    pub async fn submit_rating(
        &self,
        title: &str,
        rater_id: &str,
        rating: f64,
    ) -> Result<RatingSubmission> {
        validate_rater_id(rater_id)?;
        validate_rating(rating)?;

        // NotFound before any write; a concurrent delete still surfaces as
        // NotFound through the foreign key
        self.get_movie(title).await?;

        let rating = Rating {
            movie_title: title.to_string(),
            rater_id: rater_id.to_string(),
            rating,
        };
        let created = self.ratings.upsert_rating(&rating).await?;

        self.cache.invalidate_aggregate(title).await;
        self.refresh_rankings(title).await;

        debug!(created, "Rating stored");
        Ok(RatingSubmission { rating, created })
    }

    /// Count and average of the ratings for `title`, served from cache when possible
    #[instrument(skip(self))]
    pub async fn get_rating_aggregate(&self, title: &str) -> Result<RatingAggregate> {
        if let Some(aggregate) = self.cache.get_aggregate(title).await {
            return Ok(aggregate);
        }

        self.get_movie(title).await?;

        let generation = self.cache.aggregate_generation(title);
        let aggregate = self.ratings.get_rating_aggregate(title).await?;
        self.cache.put_aggregate(title, &aggregate, generation).await;
        Ok(aggregate)
    }

    /// Probe the durable store
    pub async fn check_store(&self) -> Result<()> {
        self.movies.ping().await
    }

    /// Highest average ratings; empty when the index is unavailable
    pub async fn top_rated(&self, limit: Option<i64>) -> Vec<RankedMovie> {
        self.ranking
            .top_rated(effective_limit(limit))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Top rated ranking unavailable");
                Vec::new()
            })
    }

    /// Most rated movies; empty when the index is unavailable
    pub async fn most_popular(&self, limit: Option<i64>) -> Vec<RankedMovie> {
        self.ranking
            .most_popular(effective_limit(limit))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Popularity ranking unavailable");
                Vec::new()
            })
    }

    /// Recompute the aggregate from the store and push both ranking scores.
    ///
    /// Refreshes of one title are serialized, so the last push always carries
    /// an aggregate read after every preceding upsert.
    async fn refresh_rankings(&self, title: &str) {
        let _guard = self.ranking_lock(title).lock().await;

        let aggregate = match self.ratings.get_rating_aggregate(title).await {
            Ok(aggregate) => aggregate,
            Err(e) => {
                warn!(title = %title, error = %e, "Skipping ranking refresh");
                return;
            }
        };

        if let Err(e) = self.ranking.record(title, &aggregate).await {
            warn!(title = %title, error = %e, "Ranking update failed");
        }
    }

    fn ranking_lock(&self, title: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        title.hash(&mut hasher);
        let index = (hasher.finish() % self.ranking_locks.len() as u64) as usize;
        &self.ranking_locks[index]
    }
}
