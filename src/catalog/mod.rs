//! Client for the hosted movie catalog API.
//!
//! The whole feature is credential-gated: without an API key the client is
//! simply not constructed and catalog routes answer with a configuration
//! error. The rest of the engine runs normally.

pub mod models;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::dao::documents::{CandidateId, MediaKind};

use self::models::{
    GenreList, PageResponse, ProviderDirectory, ProviderIds, TitleDetails, WatchProviders,
};

/// Default public base URL of the catalog.
pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Trending window supported by the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrendingWindow {
    /// Trending today.
    #[default]
    Day,
    /// Trending this week.
    Week,
}

/// Failures raised by the catalog client.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A request could not be sent.
    #[error("catalog request to `{path}` failed")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The catalog answered with an unexpected status.
    #[error("catalog returned {status} for `{path}`")]
    Status { path: String, status: StatusCode },
    /// The response payload did not decode.
    #[error("failed to decode catalog response for `{path}`")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Result alias for catalog calls.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Query parameters for the filter-driven discover endpoint.
#[derive(Debug, Clone, Default)]
pub struct DiscoverParams {
    /// Sort order, e.g. `popularity.desc`.
    pub sort_by: Option<String>,
    /// Rating floor.
    pub min_rating: f64,
    /// Genre ids, ANDed by the catalog.
    pub genres: Vec<u32>,
    /// Release / first-air year.
    pub year: Option<u16>,
    /// Watch region for provider constraints.
    pub region: Option<String>,
    /// Provider ids to restrict to.
    pub providers: Vec<u32>,
    /// Restrict to titles watchable in `region` at all.
    pub regional_only: bool,
    /// Page number.
    pub page: u32,
}

/// HTTP client for the catalog, with a per-region provider-id cache.
pub struct CatalogClient {
    client: Client,
    base_url: Arc<str>,
    api_key: Arc<str>,
    provider_ids: Mutex<HashMap<String, ProviderIds>>,
}

impl CatalogClient {
    /// Build a client for the given base URL and credential.
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
            api_key: Arc::from(api_key.into()),
            provider_ids: Mutex::new(HashMap::new()),
        }
    }

    fn kind_segment(kind: MediaKind) -> &'static str {
        match kind {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> CatalogResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(url)
            .query(&[("api_key", self.api_key.as_ref()), ("language", "en-US")])
            .query(params)
            .send()
            .await
            .map_err(|source| CatalogError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                path: path.to_string(),
                status,
            });
        }

        response
            .json()
            .await
            .map_err(|source| CatalogError::Decode {
                path: path.to_string(),
                source,
            })
    }

    /// Free-text title search.
    pub async fn search(
        &self,
        kind: MediaKind,
        query: &str,
        page: u32,
    ) -> CatalogResult<PageResponse> {
        let path = format!("search/{}", Self::kind_segment(kind));
        self.get_json(
            &path,
            &[
                ("query".into(), query.to_string()),
                ("include_adult".into(), "false".into()),
                ("page".into(), page.to_string()),
            ],
        )
        .await
    }

    /// Filter-driven discovery.
    pub async fn discover(
        &self,
        kind: MediaKind,
        params: DiscoverParams,
    ) -> CatalogResult<PageResponse> {
        let path = format!("discover/{}", Self::kind_segment(kind));
        let mut query: Vec<(String, String)> = vec![
            (
                "sort_by".into(),
                params.sort_by.unwrap_or_else(|| "popularity.desc".into()),
            ),
            ("vote_average.gte".into(), params.min_rating.to_string()),
            ("vote_count.gte".into(), "100".into()),
            ("page".into(), params.page.max(1).to_string()),
        ];

        if !params.genres.is_empty() {
            let joined = params
                .genres
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            query.push(("with_genres".into(), joined));
        }

        if let Some(year) = params.year {
            let key = match kind {
                MediaKind::Movie => "primary_release_year",
                MediaKind::Tv => "first_air_date_year",
            };
            query.push((key.into(), year.to_string()));
        }

        let providers = params
            .providers
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("|");

        if params.regional_only {
            if let Some(region) = &params.region {
                query.push(("watch_region".into(), region.clone()));
                if providers.is_empty() {
                    query.push((
                        "with_watch_monetization_types".into(),
                        "flatrate|free|ads|rent|buy".into(),
                    ));
                } else {
                    query.push(("with_watch_providers".into(), providers.clone()));
                    query.push(("with_watch_monetization_types".into(), "flatrate".into()));
                }
            }
        } else if !providers.is_empty() {
            query.push(("with_watch_providers".into(), providers));
            query.push((
                "watch_region".into(),
                params.region.unwrap_or_else(|| "IN".into()),
            ));
            query.push(("with_watch_monetization_types".into(), "flatrate".into()));
        }

        self.get_json(&path, &query).await
    }

    /// Currently trending titles.
    pub async fn trending(
        &self,
        kind: MediaKind,
        window: TrendingWindow,
        page: u32,
    ) -> CatalogResult<PageResponse> {
        let window = match window {
            TrendingWindow::Day => "day",
            TrendingWindow::Week => "week",
        };
        let path = format!("trending/{}/{window}", Self::kind_segment(kind));
        self.get_json(&path, &[("page".into(), page.max(1).to_string())])
            .await
    }

    /// Full metadata for one title.
    pub async fn details(&self, kind: MediaKind, id: CandidateId) -> CatalogResult<TitleDetails> {
        let path = format!("{}/{id}", Self::kind_segment(kind));
        self.get_json(&path, &[]).await
    }

    /// Genre directory for the given kind.
    pub async fn genres(&self, kind: MediaKind) -> CatalogResult<GenreList> {
        let path = format!("genre/{}/list", Self::kind_segment(kind));
        self.get_json(&path, &[]).await
    }

    /// Per-region availability for one title.
    pub async fn watch_providers(
        &self,
        kind: MediaKind,
        id: CandidateId,
    ) -> CatalogResult<WatchProviders> {
        let path = format!("{}/{id}/watch/providers", Self::kind_segment(kind));
        self.get_json(&path, &[]).await
    }

    /// Resolve the well-known provider ids for a region, caching the answer
    /// for the lifetime of the client.
    pub async fn provider_ids(&self, region: &str) -> CatalogResult<ProviderIds> {
        let region = region.to_uppercase();
        if let Some(cached) = self
            .provider_ids
            .lock()
            .expect("provider cache poisoned")
            .get(&region)
        {
            return Ok(*cached);
        }

        let directory: ProviderDirectory = self
            .get_json(
                "watch/providers/movie",
                &[("watch_region".into(), region.clone())],
            )
            .await?;
        let ids = ProviderIds::resolve(&directory);
        debug!(%region, ?ids, "resolved provider ids");

        self.provider_ids
            .lock()
            .expect("provider cache poisoned")
            .insert(region, ids);
        Ok(ids)
    }
}
