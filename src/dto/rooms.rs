use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::documents::{CandidateId, MediaKind, PlaybackState};
use crate::dto::common::RoomPhaseSnapshot;
use crate::state::room::Member;

/// Snapshot of the active room returned by room endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomResponse {
    /// Lifecycle phase.
    #[serde(flatten)]
    pub phase: RoomPhaseSnapshot,
    /// Shareable join link, when in a room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
    /// Membership list with presence classification.
    pub members: Vec<Member>,
    /// Number of members currently classified online.
    pub online_count: usize,
}

/// Move the shared playback position.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PlaybackRequest {
    /// Candidate being played.
    pub media_id: CandidateId,
    /// Movie or show.
    #[serde(default)]
    pub media_type: MediaKind,
    /// Playback position in seconds.
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub position: f64,
    /// Whether playback is running.
    #[serde(default)]
    pub is_playing: bool,
}

/// Playback record broadcast to the UI.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlaybackResponse {
    /// Current shared playback record.
    pub playback: PlaybackState,
}
