use actix_web::{
    error::ResponseError, http::StatusCode, web, HttpRequest, HttpResponse, Responder,
};
use movie_catalog_core::{CatalogError, CreateMovieRequest, ErrorKind, MovieFilter};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::service::CatalogService;

/// Header carrying the rater identity on rating submissions
pub const RATER_ID_HEADER: &str = "X-Rater-Id";

pub struct AppState {
    pub catalog: Arc<CatalogService>,
    /// Bearer token required for movie writes
    pub auth_token: String,
}

/// HTTP adapter for [`CatalogError`]
#[derive(Debug)]
pub struct ApiError(pub CatalogError);

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        Self(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidArgument => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::DegradedDependency | ErrorKind::Configuration | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        HttpResponse::build(status).json(json!({
            "error": self.0.kind().code(),
            "message": self.0.to_string()
        }))
    }
}

fn verify_bearer(req: &HttpRequest, expected: &str) -> Result<(), ApiError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| CatalogError::Unauthorized("missing Authorization header".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| CatalogError::Unauthorized("invalid Authorization header format".into()))?;

    if expected.is_empty() || token != expected {
        return Err(CatalogError::Unauthorized("invalid token".into()).into());
    }

    Ok(())
}

fn rater_id(req: &HttpRequest) -> Result<String, ApiError> {
    req.headers()
        .get(RATER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CatalogError::Unauthorized("missing X-Rater-Id header".into()).into())
}

/// Movie writes read the raw body so the bearer check runs before parsing
fn movie_payload(body: &[u8]) -> Result<CreateMovieRequest, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError(CatalogError::invalid("body", e.to_string())))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMoviesQuery {
    pub q: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub distributor: Option<String>,
    pub budget: Option<i64>,
    pub mpa_rating: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

impl ListMoviesQuery {
    /// Split into filter, limit and cursor; blank strings count as absent
    pub fn into_parts(self) -> (MovieFilter, Option<i64>, Option<String>) {
        let filter = MovieFilter {
            q: non_blank(self.q),
            year: self.year,
            genre: non_blank(self.genre),
            distributor: non_blank(self.distributor),
            budget: self.budget,
            mpa_rating: non_blank(self.mpa_rating),
        };
        (filter, self.limit, non_blank(self.cursor))
    }
}

#[derive(Debug, Deserialize)]
pub struct RatingBody {
    pub rating: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

async fn create_movie(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    verify_bearer(&req, &data.auth_token)?;
    let payload = movie_payload(&body)?;

    let movie = data.catalog.create_movie(payload).await?;
    Ok(HttpResponse::Created().json(movie))
}

async fn list_movies(
    data: web::Data<AppState>,
    query: web::Query<ListMoviesQuery>,
) -> Result<HttpResponse, ApiError> {
    let (filter, limit, cursor) = query.into_inner().into_parts();

    let page = data
        .catalog
        .list_movies(filter, limit, cursor.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

async fn get_movie(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let movie = data.catalog.get_movie(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(movie))
}

async fn update_movie(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    verify_bearer(&req, &data.auth_token)?;
    let payload = movie_payload(&body)?;

    let movie = data
        .catalog
        .update_movie(&path.into_inner(), payload)
        .await?;
    Ok(HttpResponse::Ok().json(movie))
}

async fn submit_rating(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<RatingBody>,
) -> Result<HttpResponse, ApiError> {
    let rater_id = rater_id(&req)?;

    let submission = data
        .catalog
        .submit_rating(&path.into_inner(), &rater_id, payload.rating)
        .await?;

    let mut response = if submission.created {
        HttpResponse::Created()
    } else {
        HttpResponse::Ok()
    };
    Ok(response.json(submission.rating))
}

async fn get_rating(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let aggregate = data
        .catalog
        .get_rating_aggregate(&path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(aggregate))
}

async fn top_rated(data: web::Data<AppState>, query: web::Query<LimitQuery>) -> impl Responder {
    HttpResponse::Ok().json(data.catalog.top_rated(query.limit).await)
}

async fn most_popular(data: web::Data<AppState>, query: web::Query<LimitQuery>) -> impl Responder {
    HttpResponse::Ok().json(data.catalog.most_popular(query.limit).await)
}

async fn health_check(data: web::Data<AppState>) -> impl Responder {
    match data.catalog.check_store().await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok" })),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(json!({ "status": "unavailable" }))
        }
    }
}

/// Malformed JSON bodies and query strings are `InvalidArgument`
fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError(CatalogError::invalid("body", err.to_string())).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ApiError(CatalogError::invalid("query", err.to_string())).into()
    }));
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    extractor_configs(cfg);

    cfg.route("/healthz", web::get().to(health_check))
        .service(
            web::scope("/movies")
                .route("", web::post().to(create_movie))
                .route("", web::get().to(list_movies))
                .route("/{title}", web::get().to(get_movie))
                .route("/{title}", web::put().to(update_movie))
                .route("/{title}/ratings", web::post().to(submit_rating))
                .route("/{title}/rating", web::get().to(get_rating)),
        )
        .service(
            web::scope("/rankings")
                .route("/top", web::get().to(top_rated))
                .route("/popular", web::get().to(most_popular)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as actix_test;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CatalogError::movie_not_found("A"), StatusCode::NOT_FOUND),
            (CatalogError::movie_conflict("A"), StatusCode::CONFLICT),
            (
                CatalogError::invalid("rating", "off grid"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CatalogError::Unauthorized("no".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                CatalogError::Unavailable {
                    operation: "listing movies",
                    message: "down".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CatalogError::internal("x", "y"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError(err).status_code(), status);
        }
    }

    #[actix_web::test]
    async fn test_verify_bearer() {
        let req = actix_test::TestRequest::default()
            .insert_header(("Authorization", "Bearer secret"))
            .to_http_request();
        assert!(verify_bearer(&req, "secret").is_ok());
        assert!(verify_bearer(&req, "other").is_err());
        assert!(verify_bearer(&req, "").is_err());

        let req = actix_test::TestRequest::default()
            .insert_header(("Authorization", "Basic secret"))
            .to_http_request();
        assert!(verify_bearer(&req, "secret").is_err());

        let req = actix_test::TestRequest::default().to_http_request();
        assert!(verify_bearer(&req, "secret").is_err());
    }

    #[actix_web::test]
    async fn test_rater_id_header() {
        let req = actix_test::TestRequest::default()
            .insert_header((RATER_ID_HEADER, " r1 "))
            .to_http_request();
        assert_eq!(rater_id(&req).unwrap(), "r1");

        let req = actix_test::TestRequest::default()
            .insert_header((RATER_ID_HEADER, ""))
            .to_http_request();
        assert!(rater_id(&req).is_err());
    }

    #[test]
    fn test_movie_payload_parsing() {
        let payload =
            movie_payload(br#"{"title":"Alpha","genre":"Drama","releaseDate":"2024-01-01"}"#)
                .unwrap();
        assert_eq!(payload.title, "Alpha");
        assert_eq!(payload.release_date, "2024-01-01");

        let err = movie_payload(b"{broken").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_blank_query_params_are_absent() {
        let query = ListMoviesQuery {
            genre: Some("  ".into()),
            cursor: Some(String::new()),
            mpa_rating: Some("PG".into()),
            ..Default::default()
        };

        let (filter, limit, cursor) = query.into_parts();
        assert!(filter.genre.is_none());
        assert_eq!(filter.mpa_rating.as_deref(), Some("PG"));
        assert!(limit.is_none());
        assert!(cursor.is_none());
    }
}
