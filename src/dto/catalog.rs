use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::catalog::TrendingWindow;
use crate::dao::documents::MediaKind;

/// Query parameters of the search/discover endpoint. An empty or missing
/// `query` switches to filter-driven discovery.
#[derive(Debug, Default, Deserialize, Validate, IntoParams, ToSchema)]
pub struct SearchQuery {
    /// Free-text query.
    #[validate(length(max = 200))]
    #[serde(default)]
    pub query: Option<String>,
    /// Kind of titles to search; defaults to the filter predicate's kind.
    #[serde(default)]
    pub kind: Option<MediaKind>,
    /// Result page, 1-based.
    #[serde(default)]
    pub page: Option<u32>,
    /// Sort order for discovery, e.g. `popularity.desc`.
    #[serde(default)]
    pub sort: Option<String>,
}

/// Query parameters of the trending endpoint.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct TrendingQuery {
    /// Kind of titles.
    #[serde(default)]
    pub kind: Option<MediaKind>,
    /// Trending window.
    #[serde(default)]
    pub window: TrendingWindow,
    /// Result page, 1-based.
    #[serde(default)]
    pub page: Option<u32>,
}

/// Path-less query selecting the kind for genre lookups.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct KindQuery {
    /// Kind of titles.
    #[serde(default)]
    pub kind: Option<MediaKind>,
}
