use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::pick::{PickRequest, PickResponse},
    error::AppError,
    services::pick_service,
    state::SharedState,
};

/// Routes running the pick engine.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/pick", post(pick))
        .route("/pick/reroll", post(reroll))
}

#[utoipa::path(
    post,
    path = "/pick",
    tag = "pick",
    request_body = PickRequest,
    responses(
        (status = 200, description = "A candidate was drawn", body = PickResponse),
        (status = 400, description = "The pool is empty"),
        (status = 401, description = "Sign-in required to pick in a room")
    )
)]
/// Draw a uniform-random candidate from the filtered pool.
pub async fn pick(
    State(state): State<SharedState>,
    payload: Option<Json<PickRequest>>,
) -> Result<Json<PickResponse>, AppError> {
    let avoid = payload.and_then(|Json(request)| request.avoid_id);
    let outcome = pick_service::pick(&state, avoid).await?;
    Ok(Json(PickResponse {
        candidate: outcome.candidate,
        broadcast: outcome.broadcast,
    }))
}

#[utoipa::path(
    post,
    path = "/pick/reroll",
    tag = "pick",
    responses((status = 200, description = "A different candidate was drawn", body = PickResponse))
)]
/// Draw again, avoiding the previous pick when possible.
pub async fn reroll(State(state): State<SharedState>) -> Result<Json<PickResponse>, AppError> {
    let outcome = pick_service::reroll(&state).await?;
    Ok(Json(PickResponse {
        candidate: outcome.candidate,
        broadcast: outcome.broadcast,
    }))
}
