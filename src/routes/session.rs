use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::session::{SessionResponse, SignInRequest},
    error::AppError,
    services::sync_service,
    state::{SharedState, session::Identity},
};

/// Routes handling the authenticated identity.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session", get(current_session).post(sign_in))
        .route("/session/sign-out", post(sign_out))
}

#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    responses((status = 200, description = "Current session", body = SessionResponse))
)]
/// Return the identity currently signed in, if any.
pub async fn current_session(State(state): State<SharedState>) -> Json<SessionResponse> {
    Json(SessionResponse {
        identity: state.session().current(),
    })
}

#[utoipa::path(
    post,
    path = "/session",
    tag = "session",
    request_body = SignInRequest,
    responses((status = 200, description = "Identity installed", body = SessionResponse))
)]
/// Install an identity resolved by the external auth provider.
pub async fn sign_in(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SignInRequest>>,
) -> Result<Json<SessionResponse>, AppError> {
    let identity = Identity {
        id: payload
            .id
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
        display_name: payload.display_name,
        avatar_url: payload.avatar_url,
    };
    sync_service::handle_sign_in(&state, identity).await;

    Ok(Json(SessionResponse {
        identity: state.session().current(),
    }))
}

#[utoipa::path(
    post,
    path = "/session/sign-out",
    tag = "session",
    responses((status = 200, description = "Signed out", body = SessionResponse))
)]
/// Clear the current identity.
pub async fn sign_out(State(state): State<SharedState>) -> Json<SessionResponse> {
    sync_service::handle_sign_out(&state).await;
    Json(SessionResponse { identity: None })
}
