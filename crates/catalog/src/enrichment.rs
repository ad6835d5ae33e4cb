//! Box-office enrichment client
//!
//! Fetches revenue data for a title from an external provider with bounded
//! linear-backoff retries. A 404 is terminal; transport errors, other non-2xx
//! statuses and undecodable bodies are retried. Every failure ends as a miss,
//! movie creation never fails because of enrichment.

use async_trait::async_trait;
use chrono::Utc;
use movie_catalog_core::models::{BOX_OFFICE_CURRENCY, BOX_OFFICE_SOURCE};
use movie_catalog_core::retry::{retry_with_backoff, RetryPolicy};
use movie_catalog_core::{BoxOffice, Movie, Revenue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::BoxOfficeConfig;

/// Errors from a single provider request
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("No box office data for '{0}'")]
    NotFound(String),

    #[error("Provider returned status {0}")]
    Status(StatusCode),

    #[error("Provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed provider response: {0}")]
    Decode(String),
}

impl EnrichmentError {
    /// Everything except a 404 is worth another attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// Provider response body
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxOfficeData {
    #[serde(default)]
    pub title: String,
    pub distributor: Option<String>,
    pub release_date: Option<String>,
    pub budget: Option<i64>,
    pub revenue: Option<Revenue>,
    pub mpa_rating: Option<String>,
}

/// Source of box-office data for a title
#[async_trait]
pub trait BoxOfficeProvider: Send + Sync {
    /// `None` on miss or any failure
    async fn fetch(&self, title: &str) -> Option<BoxOfficeData>;
}

/// HTTP client for the box-office provider
#[derive(Clone)]
pub struct BoxOfficeClient {
    client: Client,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl BoxOfficeClient {
    /// Create a client for `base_url`
    ///
    /// # Arguments
    /// * `base_url` - Provider base URL, `/boxoffice` is appended
    /// * `api_key` - Sent as `X-API-Key`
    /// * `request_timeout` - Timeout of a single request
    /// * `policy` - Retry policy for transient failures
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, EnrichmentError> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            policy,
        })
    }

    /// Client from configuration; `None` when no provider URL is set
    pub fn from_config(config: &BoxOfficeConfig) -> Result<Option<Self>, EnrichmentError> {
        config
            .url
            .as_ref()
            .map(|url| {
                Self::new(
                    url.clone(),
                    config.api_key.clone(),
                    config.request_timeout,
                    config.retry_policy(),
                )
            })
            .transpose()
    }

    /// Fetch with retries, surfacing the final error
    #[instrument(skip(self), fields(title = %title))]
    pub async fn get_box_office(&self, title: &str) -> Result<BoxOfficeData, EnrichmentError> {
        retry_with_backoff(
            || self.request_once(title),
            self.policy.clone(),
            EnrichmentError::is_retryable,
        )
        .await
    }

    async fn request_once(&self, title: &str) -> Result<BoxOfficeData, EnrichmentError> {
        let url = format!("{}/boxoffice", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("title", title)])
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(EnrichmentError::NotFound(title.to_string()));
        }
        if !status.is_success() {
            debug!(status = %status, "Box office provider returned error status");
            return Err(EnrichmentError::Status(status));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| EnrichmentError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BoxOfficeProvider for BoxOfficeClient {
    async fn fetch(&self, title: &str) -> Option<BoxOfficeData> {
        match self.get_box_office(title).await {
            Ok(data) => Some(data),
            Err(EnrichmentError::NotFound(_)) => {
                debug!(title = %title, "No box office data available");
                None
            }
            Err(e) => {
                warn!(title = %title, error = %e, "Box office enrichment failed");
                None
            }
        }
    }
}

/// Provider used when enrichment is not configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBoxOffice;

#[async_trait]
impl BoxOfficeProvider for DisabledBoxOffice {
    async fn fetch(&self, _title: &str) -> Option<BoxOfficeData> {
        None
    }
}

/// Merge provider data into `movie`.
///
/// Distributor, budget and MPA rating are only filled when unset. Revenue,
/// when present, replaces the box-office snapshot and is stamped with
/// currency, source and the current time.
pub fn merge_box_office(movie: &mut Movie, data: BoxOfficeData) {
    if movie.distributor.is_none() {
        movie.distributor = data.distributor;
    }
    if movie.budget.is_none() {
        movie.budget = data.budget;
    }
    if movie.mpa_rating.is_none() {
        movie.mpa_rating = data.mpa_rating;
    }

    if let Some(revenue) = data.revenue {
        movie.box_office = Some(BoxOffice {
            revenue,
            currency: BOX_OFFICE_CURRENCY.to_string(),
            source: BOX_OFFICE_SOURCE.to_string(),
            last_updated: Utc::now(),
        });
    }
}
