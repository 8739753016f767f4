use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};

use crate::{
    dao::documents::{Candidate, CandidateId, Prefs, WatchFilters},
    dto::pool::LibraryResponse,
    error::AppError,
    services::pool_service,
    state::SharedState,
};

/// Routes over the pool/watched/filters/prefs aggregate.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/library", get(get_library))
        .route("/pool", post(add_candidate))
        .route("/pool/clear", post(clear_pool))
        .route("/pool/{id}", axum::routing::delete(remove_candidate))
        .route("/pool/{id}/watched", post(toggle_watched))
        .route("/filters", put(update_filters))
        .route("/prefs", put(update_prefs))
}

#[utoipa::path(
    get,
    path = "/library",
    tag = "pool",
    responses((status = 200, description = "Current library", body = LibraryResponse))
)]
/// Snapshot the pool, watched set, filters and preferences.
pub async fn get_library(State(state): State<SharedState>) -> Json<LibraryResponse> {
    Json(pool_service::library_snapshot(&state).await.into())
}

#[utoipa::path(
    post,
    path = "/pool",
    tag = "pool",
    request_body = Candidate,
    responses(
        (status = 200, description = "Candidate added (or duplicate notice)", body = LibraryResponse),
        (status = 401, description = "Sign-in required for room writes")
    )
)]
/// Add a candidate snapshot to the front of the pool.
pub async fn add_candidate(
    State(state): State<SharedState>,
    Json(candidate): Json<Candidate>,
) -> Result<Json<LibraryResponse>, AppError> {
    pool_service::add_candidate(&state, candidate).await?;
    Ok(Json(pool_service::library_snapshot(&state).await.into()))
}

#[utoipa::path(
    delete,
    path = "/pool/{id}",
    tag = "pool",
    params(("id" = u64, Path, description = "Candidate id to remove")),
    responses((status = 200, description = "Candidate removed", body = LibraryResponse))
)]
/// Remove a candidate from the pool.
pub async fn remove_candidate(
    State(state): State<SharedState>,
    Path(id): Path<CandidateId>,
) -> Result<Json<LibraryResponse>, AppError> {
    pool_service::remove_candidate(&state, id).await?;
    Ok(Json(pool_service::library_snapshot(&state).await.into()))
}

#[utoipa::path(
    post,
    path = "/pool/{id}/watched",
    tag = "pool",
    params(("id" = u64, Path, description = "Candidate id to toggle")),
    responses((status = 200, description = "Watched mark toggled", body = LibraryResponse))
)]
/// Flip the watched mark for a candidate.
pub async fn toggle_watched(
    State(state): State<SharedState>,
    Path(id): Path<CandidateId>,
) -> Result<Json<LibraryResponse>, AppError> {
    pool_service::toggle_watched(&state, id).await?;
    Ok(Json(pool_service::library_snapshot(&state).await.into()))
}

#[utoipa::path(
    post,
    path = "/pool/clear",
    tag = "pool",
    responses((status = 200, description = "Pool emptied", body = LibraryResponse))
)]
/// Empty the pool.
pub async fn clear_pool(
    State(state): State<SharedState>,
) -> Result<Json<LibraryResponse>, AppError> {
    pool_service::clear_pool(&state).await?;
    Ok(Json(pool_service::library_snapshot(&state).await.into()))
}

#[utoipa::path(
    put,
    path = "/filters",
    tag = "pool",
    request_body = WatchFilters,
    responses((status = 200, description = "Filters replaced", body = LibraryResponse))
)]
/// Replace the filter predicate.
pub async fn update_filters(
    State(state): State<SharedState>,
    Json(filters): Json<WatchFilters>,
) -> Json<LibraryResponse> {
    Json(pool_service::update_filters(&state, filters).await.into())
}

#[utoipa::path(
    put,
    path = "/prefs",
    tag = "pool",
    request_body = Prefs,
    responses((status = 200, description = "Preferences replaced", body = LibraryResponse))
)]
/// Replace the preferences blob.
pub async fn update_prefs(
    State(state): State<SharedState>,
    Json(prefs): Json<Prefs>,
) -> Json<LibraryResponse> {
    Json(pool_service::update_prefs(&state, prefs).await.into())
}
