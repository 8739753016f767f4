use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::documents::{Candidate, CandidateId};

/// Parameters of a pick draw.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PickRequest {
    /// Candidate to exclude on reroll, when more than one remains.
    #[serde(default)]
    pub avoid_id: Option<CandidateId>,
}

/// Result of a pick draw.
#[derive(Debug, Serialize, ToSchema)]
pub struct PickResponse {
    /// The chosen candidate.
    pub candidate: Candidate,
    /// Whether the pick was also broadcast to the active room.
    pub broadcast: bool,
}
