//! Movie catalog domain models
//!
//! All models serialize with camelCase field names; the same representation is
//! used for cached values and HTTP bodies.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Currency stamped on enrichment revenue
pub const BOX_OFFICE_CURRENCY: &str = "USD";

/// Provenance stamped on enrichment revenue
pub const BOX_OFFICE_SOURCE: &str = "BoxOfficeAPI";

/// A catalog movie. `title` is the business key and is globally unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    /// Time-ordered identifier (UUID v7), immutable once assigned
    pub id: Uuid,
    pub title: String,
    pub release_date: NaiveDate,
    pub genre: String,
    pub distributor: Option<String>,
    pub budget: Option<i64>,
    pub mpa_rating: Option<String>,
    /// Enrichment snapshot; absent or complete, never partial
    pub box_office: Option<BoxOffice>,
}

impl Movie {
    /// Build a new, unenriched movie with a fresh time-ordered id
    pub fn new(
        title: impl Into<String>,
        release_date: NaiveDate,
        genre: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            release_date,
            genre: genre.into(),
            distributor: None,
            budget: None,
            mpa_rating: None,
            box_office: None,
        }
    }
}

/// Revenue snapshot owned by a [`Movie`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxOffice {
    pub revenue: Revenue,
    pub currency: String,
    pub source: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revenue {
    pub worldwide: i64,
    #[serde(rename = "openingWeekendUSA")]
    pub opening_weekend_usa: Option<i64>,
}

/// Caller input for movie creation, validated by the use case
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMovieRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub genre: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub release_date: String,
    pub distributor: Option<String>,
    pub budget: Option<i64>,
    pub mpa_rating: Option<String>,
}

/// A single rater's score for a movie; unique per `(movie_title, rater_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub movie_title: String,
    pub rater_id: String,
    pub rating: f64,
}

/// Outcome of a rating upsert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSubmission {
    pub rating: Rating,
    /// True when the pair was inserted, false when an existing row was updated
    pub created: bool,
}

/// Derived rating statistics; recomputable from the rating set alone
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingAggregate {
    /// Mean rounded to one decimal, 0 when there are no ratings
    pub average: f64,
    pub count: i64,
}

/// Conjunctive listing filters. Every present field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieFilter {
    /// Case-insensitive substring of the title
    pub q: Option<String>,
    /// Release year
    pub year: Option<i32>,
    /// Case-insensitive exact genre
    pub genre: Option<String>,
    /// Case-insensitive exact distributor
    pub distributor: Option<String>,
    /// Budget ceiling, inclusive
    pub budget: Option<i64>,
    /// Exact classification
    pub mpa_rating: Option<String>,
}

impl MovieFilter {
    /// Whether `movie` satisfies every present filter field
    pub fn matches(&self, movie: &Movie) -> bool {
        use chrono::Datelike;

        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            if !movie.title.to_lowercase().contains(&q.to_lowercase()) {
                return false;
            }
        }
        if let Some(year) = self.year {
            if movie.release_date.year() != year {
                return false;
            }
        }
        if let Some(genre) = &self.genre {
            if !movie.genre.eq_ignore_ascii_case(genre) {
                return false;
            }
        }
        if let Some(distributor) = &self.distributor {
            match &movie.distributor {
                Some(d) if d.eq_ignore_ascii_case(distributor) => {}
                _ => return false,
            }
        }
        if let Some(ceiling) = self.budget {
            match movie.budget {
                Some(b) if b <= ceiling => {}
                _ => return false,
            }
        }
        if let Some(mpa) = &self.mpa_rating {
            if movie.mpa_rating.as_deref() != Some(mpa.as_str()) {
                return false;
            }
        }
        true
    }

    /// Copy with the case-insensitive fields lower-cased; equal for filters
    /// that select the same rows
    pub fn normalized(&self) -> Self {
        let lower = |v: &Option<String>| v.as_ref().map(|s| s.to_lowercase());
        Self {
            q: lower(&self.q),
            genre: lower(&self.genre),
            distributor: lower(&self.distributor),
            ..self.clone()
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoviePage {
    pub items: Vec<Movie>,
    /// Present iff more items follow
    pub next_cursor: Option<String>,
}

/// Entry read back from a ranking index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMovie {
    pub title: String,
    pub score: f64,
}
