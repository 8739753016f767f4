use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/events",
    tag = "events",
    responses((status = 200, description = "UI event stream", content_type = "text/event-stream", body = String))
)]
/// Stream engine events (notices, library/member/message updates) to the
/// rendering layer.
pub async fn event_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe(&state);
    info!("new UI event stream connection");
    sse_service::broadcast_handshake(&state).await;
    sse_service::to_sse_stream(receiver)
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/events", get(event_stream))
}
