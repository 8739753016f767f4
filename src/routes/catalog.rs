use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    catalog::models::{GenreList, PageResponse, TitleDetails, WatchProviders},
    dao::documents::{CandidateId, MediaKind},
    dto::catalog::{KindQuery, SearchQuery, TrendingQuery},
    error::AppError,
    services::catalog_service,
    state::SharedState,
};

/// Routes proxying the movie catalog for the front end.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/catalog/search", get(search))
        .route("/catalog/trending", get(trending))
        .route("/catalog/genres", get(genres))
        .route("/catalog/{kind}/{id}", get(details))
        .route("/catalog/{kind}/{id}/providers", get(watch_providers))
}

#[utoipa::path(
    get,
    path = "/catalog/search",
    tag = "catalog",
    params(SearchQuery),
    responses(
        (status = 200, description = "Search or discovery results", body = PageResponse),
        (status = 503, description = "Catalog credential not configured")
    )
)]
/// Search by free text, or discover against the current filters when the
/// query is empty.
pub async fn search(
    State(state): State<SharedState>,
    Valid(Query(request)): Valid<Query<SearchQuery>>,
) -> Result<Json<PageResponse>, AppError> {
    Ok(Json(catalog_service::search(&state, request).await?))
}

#[utoipa::path(
    get,
    path = "/catalog/trending",
    tag = "catalog",
    params(TrendingQuery),
    responses((status = 200, description = "Trending titles", body = PageResponse))
)]
/// Currently trending titles.
pub async fn trending(
    State(state): State<SharedState>,
    Query(request): Query<TrendingQuery>,
) -> Result<Json<PageResponse>, AppError> {
    Ok(Json(catalog_service::trending(&state, request).await?))
}

#[utoipa::path(
    get,
    path = "/catalog/genres",
    tag = "catalog",
    params(KindQuery),
    responses((status = 200, description = "Genre directory", body = GenreList))
)]
/// Genre directory for a kind.
pub async fn genres(
    State(state): State<SharedState>,
    Query(request): Query<KindQuery>,
) -> Result<Json<GenreList>, AppError> {
    let kind = request.kind.unwrap_or_default();
    Ok(Json(catalog_service::genres(&state, kind).await?))
}

#[utoipa::path(
    get,
    path = "/catalog/{kind}/{id}",
    tag = "catalog",
    params(
        ("kind" = MediaKind, Path, description = "movie or tv"),
        ("id" = u64, Path, description = "Catalog title id")
    ),
    responses((status = 200, description = "Full title metadata", body = TitleDetails))
)]
/// Full metadata for one title.
pub async fn details(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(MediaKind, CandidateId)>,
) -> Result<Json<TitleDetails>, AppError> {
    Ok(Json(catalog_service::details(&state, kind, id).await?))
}

#[utoipa::path(
    get,
    path = "/catalog/{kind}/{id}/providers",
    tag = "catalog",
    params(
        ("kind" = MediaKind, Path, description = "movie or tv"),
        ("id" = u64, Path, description = "Catalog title id")
    ),
    responses((status = 200, description = "Per-region watch providers", body = WatchProviders))
)]
/// Per-region availability for one title.
pub async fn watch_providers(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(MediaKind, CandidateId)>,
) -> Result<Json<WatchProviders>, AppError> {
    Ok(Json(
        catalog_service::watch_providers(&state, kind, id).await?,
    ))
}
