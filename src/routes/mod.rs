use axum::Router;

use crate::state::SharedState;

pub mod catalog;
pub mod docs;
pub mod health;
pub mod lists;
pub mod messages;
pub mod pick;
pub mod pool;
pub mod rooms;
pub mod session;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(session::router())
        .merge(pool::router())
        .merge(pick::router())
        .merge(rooms::router())
        .merge(messages::router())
        .merge(catalog::router())
        .merge(lists::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
