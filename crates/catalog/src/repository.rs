//! Durable repository: source of truth for movies and ratings

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use movie_catalog_core::{
    BoxOffice, CatalogError, Movie, MovieFilter, Rating, RatingAggregate, Result, Revenue,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Movie persistence
#[async_trait]
pub trait MovieRepository: Send + Sync {
    /// Insert a movie; `Conflict` when the title is taken
    async fn create_movie(&self, movie: &Movie) -> Result<()>;

    /// `NotFound` when no movie has this title
    async fn get_movie_by_title(&self, title: &str) -> Result<Movie>;

    /// Up to `limit + 1` movies matching `filter`, starting at `offset`,
    /// ordered by id (insertion order)
    async fn list_movies(&self, filter: &MovieFilter, limit: usize, offset: u64)
        -> Result<Vec<Movie>>;

    /// Replace every field of the movie with this title; `NotFound` if absent
    async fn update_movie(&self, movie: &Movie) -> Result<()>;

    /// Round trip to the store; `Unavailable` when unreachable
    async fn ping(&self) -> Result<()>;
}

/// Rating persistence
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Atomic insert-or-update keyed by `(movie_title, rater_id)`.
    /// Returns true when a new row was inserted.
    async fn upsert_rating(&self, rating: &Rating) -> Result<bool>;

    /// Count and one-decimal average of every rating for `title`
    async fn get_rating_aggregate(&self, title: &str) -> Result<RatingAggregate>;
}

const MOVIE_COLUMNS: &str = "id, title, release_date, genre, distributor, budget, mpa_rating, \
     box_office_worldwide, box_office_opening_usa, box_office_currency, box_office_source, \
     box_office_last_updated";

#[derive(Debug, sqlx::FromRow)]
struct MovieRow {
    id: Uuid,
    title: String,
    release_date: NaiveDate,
    genre: String,
    distributor: Option<String>,
    budget: Option<i64>,
    mpa_rating: Option<String>,
    box_office_worldwide: Option<i64>,
    box_office_opening_usa: Option<i64>,
    box_office_currency: Option<String>,
    box_office_source: Option<String>,
    box_office_last_updated: Option<DateTime<Utc>>,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        let box_office = match (
            row.box_office_worldwide,
            row.box_office_currency,
            row.box_office_source,
            row.box_office_last_updated,
        ) {
            (Some(worldwide), Some(currency), Some(source), Some(last_updated)) => {
                Some(BoxOffice {
                    revenue: Revenue {
                        worldwide,
                        opening_weekend_usa: row.box_office_opening_usa,
                    },
                    currency,
                    source,
                    last_updated,
                })
            }
            _ => None,
        };

        Movie {
            id: row.id,
            title: row.title,
            release_date: row.release_date,
            genre: row.genre,
            distributor: row.distributor,
            budget: row.budget,
            mpa_rating: row.mpa_rating,
            box_office,
        }
    }
}

/// Escape `%`, `_` and `\` so a user query matches literally inside ILIKE
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Append the WHERE clauses for `filter`
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &MovieFilter) {
    builder.push(" WHERE TRUE");

    if let Some(q) = filter.q.as_deref().filter(|q| !q.is_empty()) {
        builder
            .push(" AND title ILIKE ")
            .push_bind(format!("%{}%", escape_like(q)));
    }
    if let Some(year) = filter.year {
        builder
            .push(" AND EXTRACT(YEAR FROM release_date) = ")
            .push_bind(year);
    }
    if let Some(genre) = &filter.genre {
        builder
            .push(" AND LOWER(genre) = LOWER(")
            .push_bind(genre.clone())
            .push(")");
    }
    if let Some(distributor) = &filter.distributor {
        builder
            .push(" AND LOWER(distributor) = LOWER(")
            .push_bind(distributor.clone())
            .push(")");
    }
    if let Some(budget) = filter.budget {
        builder.push(" AND budget <= ").push_bind(budget);
    }
    if let Some(mpa_rating) = &filter.mpa_rating {
        builder.push(" AND mpa_rating = ").push_bind(mpa_rating.clone());
    }
}

/// PostgreSQL implementation of the movie and rating repositories
#[derive(Clone)]
pub struct PostgresCatalogRepository {
    pool: PgPool,
}

impl PostgresCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CatalogError::internal("running migrations", e.to_string()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MovieRepository for PostgresCatalogRepository {
    #[instrument(skip(self, movie), fields(title = %movie.title))]
    async fn create_movie(&self, movie: &Movie) -> Result<()> {
        let revenue = movie.box_office.as_ref().map(|b| &b.revenue);

        sqlx::query(
            r#"
            INSERT INTO movies (
                id, title, release_date, genre, distributor, budget, mpa_rating,
                box_office_worldwide, box_office_opening_usa, box_office_currency,
                box_office_source, box_office_last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(movie.release_date)
        .bind(&movie.genre)
        .bind(&movie.distributor)
        .bind(movie.budget)
        .bind(&movie.mpa_rating)
        .bind(revenue.map(|r| r.worldwide))
        .bind(revenue.and_then(|r| r.opening_weekend_usa))
        .bind(movie.box_office.as_ref().map(|b| b.currency.as_str()))
        .bind(movie.box_office.as_ref().map(|b| b.source.as_str()))
        .bind(movie.box_office.as_ref().map(|b| b.last_updated))
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::from_sqlx("creating movie", &movie.title, e))?;

        debug!(id = %movie.id, "Movie inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_movie_by_title(&self, title: &str) -> Result<Movie> {
        let query = format!("SELECT {} FROM movies WHERE title = $1", MOVIE_COLUMNS);

        let row = sqlx::query_as::<_, MovieRow>(&query)
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::from_sqlx("loading movie", title, e))?;

        row.map(Movie::from)
            .ok_or_else(|| CatalogError::movie_not_found(title))
    }

    #[instrument(skip(self))]
    async fn list_movies(
        &self,
        filter: &MovieFilter,
        limit: usize,
        offset: u64,
    ) -> Result<Vec<Movie>> {
        let offset = i64::try_from(offset)
            .map_err(|_| CatalogError::invalid_cursor("cursor offset out of range"))?;
        let fetch = i64::try_from(limit.saturating_add(1)).unwrap_or(i64::MAX);

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM movies",
            MOVIE_COLUMNS
        ));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY id LIMIT ")
            .push_bind(fetch)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder
            .build_query_as::<MovieRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::from_sqlx("listing movies", "", e))?;

        Ok(rows.into_iter().map(Movie::from).collect())
    }

    #[instrument(skip(self, movie), fields(title = %movie.title))]
    async fn update_movie(&self, movie: &Movie) -> Result<()> {
        let revenue = movie.box_office.as_ref().map(|b| &b.revenue);

        let result = sqlx::query(
            r#"
            UPDATE movies SET
                release_date = $2,
                genre = $3,
                distributor = $4,
                budget = $5,
                mpa_rating = $6,
                box_office_worldwide = $7,
                box_office_opening_usa = $8,
                box_office_currency = $9,
                box_office_source = $10,
                box_office_last_updated = $11,
                updated_at = NOW()
            WHERE title = $1
            "#,
        )
        .bind(&movie.title)
        .bind(movie.release_date)
        .bind(&movie.genre)
        .bind(&movie.distributor)
        .bind(movie.budget)
        .bind(&movie.mpa_rating)
        .bind(revenue.map(|r| r.worldwide))
        .bind(revenue.and_then(|r| r.opening_weekend_usa))
        .bind(movie.box_office.as_ref().map(|b| b.currency.as_str()))
        .bind(movie.box_office.as_ref().map(|b| b.source.as_str()))
        .bind(movie.box_office.as_ref().map(|b| b.last_updated))
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::from_sqlx("updating movie", &movie.title, e))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::movie_not_found(&movie.title));
        }

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Unavailable {
                operation: "probing database",
                message: e.to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl RatingRepository for PostgresCatalogRepository {
    #[instrument(skip(self, rating), fields(title = %rating.movie_title, rater = %rating.rater_id))]
    async fn upsert_rating(&self, rating: &Rating) -> Result<bool> {
        let created: bool = sqlx::query_scalar(
            r#"
            INSERT INTO ratings (movie_title, rater_id, rating)
            VALUES ($1, $2, CAST($3 AS DOUBLE PRECISION))
            ON CONFLICT (movie_title, rater_id)
            DO UPDATE SET rating = EXCLUDED.rating, updated_at = NOW()
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&rating.movie_title)
        .bind(&rating.rater_id)
        .bind(rating.rating)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CatalogError::from_sqlx("upserting rating", &rating.movie_title, e))?;

        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_rating_aggregate(&self, title: &str) -> Result<RatingAggregate> {
        let (count, average): (i64, f64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS count,
                COALESCE(ROUND(AVG(rating), 1), 0)::DOUBLE PRECISION AS average
            FROM ratings
            WHERE movie_title = $1
            "#,
        )
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CatalogError::from_sqlx("aggregating ratings", title, e))?;

        Ok(RatingAggregate { average, count })
    }
}
