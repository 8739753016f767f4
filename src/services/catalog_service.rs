//! Search, discovery and trending over the catalog client, parameterized by
//! the current filter predicate.

use tracing::debug;

use crate::{
    catalog::{CatalogClient, DiscoverParams},
    catalog::models::{GenreList, PageResponse, TitleDetails, WatchProviders},
    dao::documents::{CandidateId, MediaKind},
    dto::catalog::{SearchQuery, TrendingQuery},
    error::ServiceError,
    state::SharedState,
};

fn catalog(state: &SharedState) -> Result<&CatalogClient, ServiceError> {
    state.catalog().ok_or(ServiceError::CatalogDisabled)
}

/// Search when a query is present, otherwise discover against the current
/// filter predicate.
pub async fn search(state: &SharedState, request: SearchQuery) -> Result<PageResponse, ServiceError> {
    let client = catalog(state)?;
    let filters = state.library().read().await.filters.clone();
    let kind = request.kind.unwrap_or(filters.media_kind);
    let page = request.page.unwrap_or(1).max(1);

    let query = request.query.as_deref().unwrap_or("").trim().to_string();
    if !query.is_empty() {
        return Ok(client.search(kind, &query, page).await?);
    }

    // Discovery: resolve provider toggles into catalog provider ids first.
    let mut providers = Vec::new();
    let ott = filters.ott;
    if ott.netflix || ott.prime || ott.hotstar {
        let region = filters.region.clone().unwrap_or_else(|| "IN".into());
        match client.provider_ids(&region).await {
            Ok(ids) => {
                providers.extend(ott.netflix.then_some(ids.netflix).flatten());
                providers.extend(ott.prime.then_some(ids.prime).flatten());
                providers.extend(ott.hotstar.then_some(ids.hotstar).flatten());
            }
            Err(err) => debug!(error = %err, "provider resolution failed; discovering without"),
        }
    }

    let params = DiscoverParams {
        sort_by: request.sort,
        min_rating: filters.min_rating,
        genres: filters.genres.clone(),
        year: filters.year,
        region: filters.region.clone(),
        providers,
        regional_only: filters.regional_only,
        page,
    };
    Ok(client.discover(kind, params).await?)
}

/// Currently trending titles.
pub async fn trending(
    state: &SharedState,
    request: TrendingQuery,
) -> Result<PageResponse, ServiceError> {
    let client = catalog(state)?;
    let kind = match request.kind {
        Some(kind) => kind,
        None => state.library().read().await.filters.media_kind,
    };
    Ok(client
        .trending(kind, request.window, request.page.unwrap_or(1))
        .await?)
}

/// Full metadata for one title.
pub async fn details(
    state: &SharedState,
    kind: MediaKind,
    id: CandidateId,
) -> Result<TitleDetails, ServiceError> {
    Ok(catalog(state)?.details(kind, id).await?)
}

/// Genre directory for a kind.
pub async fn genres(state: &SharedState, kind: MediaKind) -> Result<GenreList, ServiceError> {
    Ok(catalog(state)?.genres(kind).await?)
}

/// Per-region watch providers for one title.
pub async fn watch_providers(
    state: &SharedState,
    kind: MediaKind,
    id: CandidateId,
) -> Result<WatchProviders, ServiceError> {
    Ok(catalog(state)?.watch_providers(kind, id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn unconfigured_catalog_fails_with_the_feature_error() {
        let (state, _guard) = test_state().await;
        let err = search(&state, SearchQuery::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::CatalogDisabled));
    }
}
