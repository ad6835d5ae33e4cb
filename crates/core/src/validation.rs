//! Input validation for catalog writes
//!
//! Everything here runs before any side effect; failures are
//! `InvalidArgument` errors naming the offending field.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CatalogError;
use crate::models::CreateMovieRequest;

/// `YYYY-MM-DD`
pub static RELEASE_DATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Failed to compile release date regex"));

/// Smallest permitted rating
pub const MIN_RATING: f64 = 0.5;
/// Largest permitted rating
pub const MAX_RATING: f64 = 5.0;

/// Maximum title length, matching the `movies.title` column
pub const MAX_TITLE_LENGTH: usize = 255;
/// Maximum rater id length, matching the `ratings.rater_id` column
pub const MAX_RATER_ID_LENGTH: usize = 100;

/// Validate a rating is one of the ten half-point steps 0.5..=5.0
///
/// # Examples
///
/// ```
/// use movie_catalog_core::validation::validate_rating;
///
/// assert!(validate_rating(4.5).is_ok());
/// assert!(validate_rating(4.4).is_err());
/// assert!(validate_rating(0.0).is_err());
/// assert!(validate_rating(f64::NAN).is_err());
/// ```
pub fn validate_rating(rating: f64) -> Result<(), CatalogError> {
    let doubled = rating * 2.0;
    if rating.is_finite()
        && (MIN_RATING..=MAX_RATING).contains(&rating)
        && doubled.fract() == 0.0
    {
        Ok(())
    } else {
        Err(CatalogError::invalid(
            "rating",
            format!(
                "rating must be a multiple of 0.5 between {} and {}, got {}",
                MIN_RATING, MAX_RATING, rating
            ),
        ))
    }
}

/// Parse a `YYYY-MM-DD` release date
///
/// # Examples
///
/// ```
/// use movie_catalog_core::validation::parse_release_date;
///
/// assert!(parse_release_date("2024-01-01").is_ok());
/// assert!(parse_release_date("2024-02-30").is_err());
/// assert!(parse_release_date("01/01/2024").is_err());
/// ```
pub fn parse_release_date(value: &str) -> Result<NaiveDate, CatalogError> {
    if !RELEASE_DATE_REGEX.is_match(value) {
        return Err(CatalogError::invalid(
            "releaseDate",
            format!("expected YYYY-MM-DD, got '{}'", value),
        ));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| CatalogError::invalid("releaseDate", format!("'{}': {}", value, e)))
}

/// Validate a required string field is present and not blank
pub fn validate_required(value: &str, field: &'static str) -> Result<(), CatalogError> {
    if value.trim().is_empty() {
        Err(CatalogError::invalid(field, "must not be empty"))
    } else {
        Ok(())
    }
}

/// Validate string length does not exceed `max` characters
pub fn validate_max_length(
    value: &str,
    field: &'static str,
    max: usize,
) -> Result<(), CatalogError> {
    let len = value.chars().count();
    if len > max {
        return Err(CatalogError::invalid(
            field,
            format!("must be at most {} characters, got {}", max, len),
        ));
    }
    Ok(())
}

/// Validate a rater id taken from the request
pub fn validate_rater_id(rater_id: &str) -> Result<(), CatalogError> {
    validate_required(rater_id, "raterId")?;
    validate_max_length(rater_id, "raterId", MAX_RATER_ID_LENGTH)
}

/// Validate a creation request, returning its parsed release date
pub fn validate_create_movie(request: &CreateMovieRequest) -> Result<NaiveDate, CatalogError> {
    validate_required(&request.title, "title")?;
    validate_max_length(&request.title, "title", MAX_TITLE_LENGTH)?;
    validate_required(&request.genre, "genre")?;

    if let Some(budget) = request.budget {
        if budget < 0 {
            return Err(CatalogError::invalid("budget", "must not be negative"));
        }
    }

    parse_release_date(&request.release_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn request() -> CreateMovieRequest {
        CreateMovieRequest {
            title: "Alpha".into(),
            genre: "Drama".into(),
            release_date: "2024-01-01".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_every_half_step_is_valid() {
        for step in 1..=10 {
            let rating = f64::from(step) * 0.5;
            assert!(validate_rating(rating).is_ok(), "{rating} should be valid");
        }
    }

    #[test]
    fn test_off_grid_ratings_are_invalid() {
        for rating in [
            0.0,
            0.25,
            4.4,
            4.75,
            5.5,
            -0.5,
            10.0,
            f64::NAN,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ] {
            let err = validate_rating(rating).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{rating}");
        }
    }

    #[test]
    fn test_release_date_parsing() {
        assert_eq!(
            parse_release_date("2024-01-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert!(parse_release_date("2024-1-1").is_err());
        assert!(parse_release_date("2024-13-01").is_err());
        assert!(parse_release_date("").is_err());
        assert!(parse_release_date("2024-01-01T00:00:00Z").is_err());
    }

    #[test]
    fn test_required_fields() {
        assert!(validate_required("x", "title").is_ok());
        assert!(validate_required("   ", "title").is_err());
    }

    #[test]
    fn test_validate_create_movie() {
        assert!(validate_create_movie(&request()).is_ok());

        let mut no_title = request();
        no_title.title = String::new();
        assert!(matches!(
            validate_create_movie(&no_title).unwrap_err(),
            CatalogError::InvalidArgument { field: "title", .. }
        ));

        let mut no_genre = request();
        no_genre.genre = " ".into();
        assert!(matches!(
            validate_create_movie(&no_genre).unwrap_err(),
            CatalogError::InvalidArgument { field: "genre", .. }
        ));

        let mut bad_date = request();
        bad_date.release_date = "yesterday".into();
        assert!(matches!(
            validate_create_movie(&bad_date).unwrap_err(),
            CatalogError::InvalidArgument {
                field: "releaseDate",
                ..
            }
        ));

        let mut negative_budget = request();
        negative_budget.budget = Some(-1);
        assert!(validate_create_movie(&negative_budget).is_err());
    }

    #[test]
    fn test_rater_id_length() {
        assert!(validate_rater_id("r1").is_ok());
        assert!(validate_rater_id("").is_err());
        assert!(validate_rater_id(&"x".repeat(MAX_RATER_ID_LENGTH + 1)).is_err());
    }
}
