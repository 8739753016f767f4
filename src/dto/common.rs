use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::room::RoomPhase;

/// Serialized view of the room lifecycle phase.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomPhaseSnapshot {
    /// Whether the client currently synchronizes a shared room.
    pub in_room: bool,
    /// Active room id, when in a room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Uuid>,
}

impl From<RoomPhase> for RoomPhaseSnapshot {
    fn from(phase: RoomPhase) -> Self {
        Self {
            in_room: phase.room_id().is_some(),
            room_id: phase.room_id(),
        }
    }
}
