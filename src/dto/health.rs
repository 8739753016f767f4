use serde::Serialize;
use utoipa::ToSchema;

/// Health status returned by the healthcheck endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `ok` when the process answers.
    pub status: &'static str,
    /// Whether the engine runs without a sync-store connection.
    pub degraded: bool,
    /// Server time, RFC3339.
    pub time: String,
}
