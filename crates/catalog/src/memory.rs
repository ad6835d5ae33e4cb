//! In-memory repository backing the use-case and HTTP tests
//!
//! Mirrors the PostgreSQL semantics: unique titles, id ordering, rating
//! upserts keyed by `(title, rater)` and one-decimal half-away-from-zero
//! averages.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use movie_catalog_core::{CatalogError, Movie, MovieFilter, Rating, RatingAggregate, Result};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::repository::{MovieRepository, RatingRepository};

#[derive(Default)]
struct Store {
    /// Ordered by id, i.e. insertion order for v7 ids
    movies: BTreeMap<Uuid, Movie>,
    titles: HashMap<String, Uuid>,
    /// title -> rater -> rating
    ratings: HashMap<String, HashMap<String, f64>>,
}

/// Repository holding everything in process memory
#[derive(Default)]
pub struct InMemoryCatalogRepository {
    store: RwLock<Store>,
    unavailable: AtomicBool,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `Unavailable` until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored ratings for `title`
    pub fn rating_count(&self, title: &str) -> usize {
        self.store
            .read()
            .ratings
            .get(title)
            .map_or(0, HashMap::len)
    }

    fn check_available(&self, operation: &'static str) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable {
                operation,
                message: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Mean of `ratings` rounded to one decimal, half away from zero.
///
/// Ratings sit on the 0.5 grid, so the sum is an exact count of half steps
/// and the rounding is done in integers.
fn rounded_average(ratings: &HashMap<String, f64>) -> RatingAggregate {
    let count = ratings.len() as i64;
    if count == 0 {
        return RatingAggregate::default();
    }

    let half_steps: i64 = ratings.values().map(|r| (r * 2.0).round() as i64).sum();
    // tenths = round(10 * half_steps / (2 * count))
    let tenths = (10 * half_steps + count).div_euclid(2 * count);

    RatingAggregate {
        average: tenths as f64 / 10.0,
        count,
    }
}

#[async_trait]
impl MovieRepository for InMemoryCatalogRepository {
    async fn create_movie(&self, movie: &Movie) -> Result<()> {
        self.check_available("creating movie")?;

        let mut store = self.store.write();
        if store.titles.contains_key(&movie.title) || store.movies.contains_key(&movie.id) {
            return Err(CatalogError::movie_conflict(&movie.title));
        }

        store.titles.insert(movie.title.clone(), movie.id);
        store.movies.insert(movie.id, movie.clone());
        Ok(())
    }

    async fn get_movie_by_title(&self, title: &str) -> Result<Movie> {
        self.check_available("loading movie")?;

        let store = self.store.read();
        store
            .titles
            .get(title)
            .and_then(|id| store.movies.get(id))
            .cloned()
            .ok_or_else(|| CatalogError::movie_not_found(title))
    }

    async fn list_movies(
        &self,
        filter: &MovieFilter,
        limit: usize,
        offset: u64,
    ) -> Result<Vec<Movie>> {
        self.check_available("listing movies")?;

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let store = self.store.read();

        Ok(store
            .movies
            .values()
            .filter(|movie| filter.matches(movie))
            .skip(offset)
            .take(limit.saturating_add(1))
            .cloned()
            .collect())
    }

    async fn update_movie(&self, movie: &Movie) -> Result<()> {
        self.check_available("updating movie")?;

        let mut store = self.store.write();
        let id = *store
            .titles
            .get(&movie.title)
            .ok_or_else(|| CatalogError::movie_not_found(&movie.title))?;

        // id is immutable; keep the stored one
        let mut updated = movie.clone();
        updated.id = id;
        store.movies.insert(id, updated);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.check_available("probing store")
    }
}

#[async_trait]
impl RatingRepository for InMemoryCatalogRepository {
    async fn upsert_rating(&self, rating: &Rating) -> Result<bool> {
        self.check_available("upserting rating")?;

        let mut store = self.store.write();
        if !store.titles.contains_key(&rating.movie_title) {
            return Err(CatalogError::movie_not_found(&rating.movie_title));
        }

        let previous = store
            .ratings
            .entry(rating.movie_title.clone())
            .or_default()
            .insert(rating.rater_id.clone(), rating.rating);

        Ok(previous.is_none())
    }

    async fn get_rating_aggregate(&self, title: &str) -> Result<RatingAggregate> {
        self.check_available("aggregating ratings")?;

        let store = self.store.read();
        Ok(store
            .ratings
            .get(title)
            .map(rounded_average)
            .unwrap_or_default())
    }
}
