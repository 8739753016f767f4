//! Health probe used by the healthcheck route.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    dto::{format_millis, health::HealthResponse},
    state::SharedState,
};

/// Current process health and sync-store connectivity.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    HealthResponse {
        status: "ok",
        degraded: state.is_degraded().await,
        time: format_millis(now_ms),
    }
}
