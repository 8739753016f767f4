use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::common::RoomPhaseSnapshot,
    dto::rooms::{PlaybackRequest, PlaybackResponse, RoomResponse},
    error::AppError,
    services::{playback_service, presence_service, sync_service},
    state::SharedState,
};

/// Routes driving the room lifecycle, presence and shared playback.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/current", get(current_room).delete(delete_room))
        .route("/rooms/leave", post(leave_room))
        .route("/rooms/presence/touch", post(presence_touch))
        .route("/rooms/playback", put(update_playback))
        .route("/rooms/{id}/join", post(join_room))
}

async fn room_response(state: &SharedState) -> RoomResponse {
    let phase = state.room().phase().await;
    let members = state.room().members().read().await.clone();
    let online_count = members.iter().filter(|member| member.online).count();
    RoomResponse {
        share_url: phase
            .room_id()
            .map(|room| sync_service::room_share_url(state, room)),
        phase: RoomPhaseSnapshot::from(phase),
        members,
        online_count,
    }
}

#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    responses(
        (status = 200, description = "Room created and joined", body = RoomResponse),
        (status = 401, description = "Sign-in required to create a room")
    )
)]
/// Create a room seeded with the current library and join it.
pub async fn create_room(
    State(state): State<SharedState>,
) -> Result<Json<RoomResponse>, AppError> {
    sync_service::create_room(&state).await?;
    Ok(Json(room_response(&state).await))
}

#[utoipa::path(
    post,
    path = "/rooms/{id}/join",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room id from a shared link")),
    responses((status = 200, description = "Room joined", body = RoomResponse))
)]
/// Join a room by id. No ownership check; anyone with the link may join.
pub async fn join_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomResponse>, AppError> {
    sync_service::join_room(&state, id).await?;
    Ok(Json(room_response(&state).await))
}

#[utoipa::path(
    post,
    path = "/rooms/leave",
    tag = "rooms",
    responses(
        (status = 200, description = "Room left, local state restored", body = RoomResponse),
        (status = 409, description = "Not in a room")
    )
)]
/// Leave the active room and fall back to personal sync.
pub async fn leave_room(State(state): State<SharedState>) -> Result<Json<RoomResponse>, AppError> {
    sync_service::leave_room(&state).await?;
    Ok(Json(room_response(&state).await))
}

#[utoipa::path(
    get,
    path = "/rooms/current",
    tag = "rooms",
    responses((status = 200, description = "Current room snapshot", body = RoomResponse))
)]
/// Snapshot the room phase and classified member list.
pub async fn current_room(State(state): State<SharedState>) -> Json<RoomResponse> {
    Json(room_response(&state).await)
}

#[utoipa::path(
    delete,
    path = "/rooms/current",
    tag = "rooms",
    responses(
        (status = 200, description = "Room deleted, local state restored", body = RoomResponse),
        (status = 401, description = "Only the owner can delete the room")
    )
)]
/// Delete the active room (owner only), sweeping its membership and message
/// sub-collections.
pub async fn delete_room(State(state): State<SharedState>) -> Result<Json<RoomResponse>, AppError> {
    sync_service::delete_room(&state).await?;
    Ok(Json(room_response(&state).await))
}

#[utoipa::path(
    post,
    path = "/rooms/presence/touch",
    tag = "rooms",
    responses((status = 200, description = "Heartbeat written", body = RoomResponse))
)]
/// Extra heartbeat outside the fixed cadence; the UI calls this when the
/// page regains visibility.
pub async fn presence_touch(State(state): State<SharedState>) -> Json<RoomResponse> {
    presence_service::heartbeat_now(&state).await;
    Json(room_response(&state).await)
}

#[utoipa::path(
    put,
    path = "/rooms/playback",
    tag = "rooms",
    request_body = PlaybackRequest,
    responses(
        (status = 200, description = "Playback position shared", body = PlaybackResponse),
        (status = 409, description = "Not in a room")
    )
)]
/// Share this client's playback position with the room.
pub async fn update_playback(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<PlaybackRequest>>,
) -> Result<Json<PlaybackResponse>, AppError> {
    let playback = playback_service::update_playback(&state, payload).await?;
    Ok(Json(PlaybackResponse { playback }))
}
