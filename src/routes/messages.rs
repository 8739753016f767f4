use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::messages::{
        MessagesResponse, ReplyDraftRequest, SendMessageRequest, ToggleReactionRequest,
    },
    error::AppError,
    services::message_service,
    state::SharedState,
};

/// Routes over the room chat channel.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/messages", get(list_messages).post(send_message))
        .route("/messages/reply", put(set_reply_draft).delete(clear_reply_draft))
        .route("/messages/{id}/reactions", post(toggle_reaction))
}

#[utoipa::path(
    get,
    path = "/messages",
    tag = "messages",
    responses((status = 200, description = "Rendered message window", body = MessagesResponse))
)]
/// Snapshot the rendered message window of the active room.
pub async fn list_messages(State(state): State<SharedState>) -> Json<MessagesResponse> {
    Json(MessagesResponse {
        messages: state.chat().messages().await,
    })
}

#[utoipa::path(
    post,
    path = "/messages",
    tag = "messages",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message sent (or duplicate dropped)"),
        (status = 409, description = "Not in a room")
    )
)]
/// Send a message to the active room, attaching mentions and any pending
/// reply draft.
pub async fn send_message(
    State(state): State<SharedState>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(), AppError> {
    message_service::send_message(&state, payload.body).await?;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/messages/{id}/reactions",
    tag = "messages",
    params(("id" = String, Path, description = "Message id")),
    request_body = ToggleReactionRequest,
    responses(
        (status = 200, description = "Reaction toggled"),
        (status = 401, description = "Sign-in required to react")
    )
)]
/// Toggle the caller's reaction on a message.
pub async fn toggle_reaction(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<ToggleReactionRequest>>,
) -> Result<(), AppError> {
    message_service::toggle_reaction(&state, &id, &payload.emoji).await?;
    Ok(())
}

#[utoipa::path(
    put,
    path = "/messages/reply",
    tag = "messages",
    request_body = ReplyDraftRequest,
    responses(
        (status = 200, description = "Reply draft set"),
        (status = 404, description = "Message not in the current window")
    )
)]
/// Point the reply draft at a message.
pub async fn set_reply_draft(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ReplyDraftRequest>>,
) -> Result<(), AppError> {
    message_service::set_reply_draft(&state, &payload.message_id).await?;
    Ok(())
}

#[utoipa::path(
    delete,
    path = "/messages/reply",
    tag = "messages",
    responses((status = 200, description = "Reply draft cleared"))
)]
/// Cancel the reply draft.
pub async fn clear_reply_draft(State(state): State<SharedState>) {
    message_service::clear_reply_draft(&state);
}
