use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::collections::{CollectionsResponse, CreateCollectionRequest, SharedListResponse},
    dto::pool::LibraryResponse,
    error::AppError,
    services::{collection_service, pool_service},
    state::SharedState,
};

/// Routes over saved collections and shared pool snapshots.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/collections", get(list_collections).post(create_collection))
        .route("/collections/{id}", axum::routing::delete(delete_collection))
        .route("/shared-lists", post(share_list))
        .route("/shared-lists/{id}/import", post(import_shared_list))
}

#[utoipa::path(
    get,
    path = "/collections",
    tag = "lists",
    responses((status = 200, description = "Saved collections", body = CollectionsResponse))
)]
/// Every saved collection of the current identity.
pub async fn list_collections(State(state): State<SharedState>) -> Json<CollectionsResponse> {
    Json(CollectionsResponse {
        collections: collection_service::saved_collections(&state),
    })
}

#[utoipa::path(
    post,
    path = "/collections",
    tag = "lists",
    request_body = CreateCollectionRequest,
    responses((status = 200, description = "Collection saved", body = CollectionsResponse))
)]
/// Save a named collection.
pub async fn create_collection(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateCollectionRequest>>,
) -> Result<Json<CollectionsResponse>, AppError> {
    collection_service::create_collection(&state, payload.name, payload.entries).await?;
    Ok(Json(CollectionsResponse {
        collections: collection_service::saved_collections(&state),
    }))
}

#[utoipa::path(
    delete,
    path = "/collections/{id}",
    tag = "lists",
    params(("id" = Uuid, Path, description = "Collection id")),
    responses((status = 200, description = "Collection deleted", body = CollectionsResponse))
)]
/// Delete a saved collection.
pub async fn delete_collection(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CollectionsResponse>, AppError> {
    collection_service::delete_collection(&state, id).await?;
    Ok(Json(CollectionsResponse {
        collections: collection_service::saved_collections(&state),
    }))
}

#[utoipa::path(
    post,
    path = "/shared-lists",
    tag = "lists",
    responses(
        (status = 200, description = "Shared snapshot minted", body = SharedListResponse),
        (status = 401, description = "Sign-in required to share")
    )
)]
/// Mint a standalone snapshot of the current library for sharing.
pub async fn share_list(
    State(state): State<SharedState>,
) -> Result<Json<SharedListResponse>, AppError> {
    let (id, url) = collection_service::create_shared_list(&state).await?;
    Ok(Json(SharedListResponse { id, url }))
}

#[utoipa::path(
    post,
    path = "/shared-lists/{id}/import",
    tag = "lists",
    params(("id" = Uuid, Path, description = "Shared list id from a link")),
    responses(
        (status = 200, description = "Snapshot imported into the library", body = LibraryResponse),
        (status = 404, description = "Unknown shared list")
    )
)]
/// Import a shared snapshot, replacing the local library.
pub async fn import_shared_list(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LibraryResponse>, AppError> {
    collection_service::import_shared_list(&state, id).await?;
    Ok(Json(pool_service::library_snapshot(&state).await.into()))
}
