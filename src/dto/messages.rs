use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::documents::MessageBody;
use crate::state::chat::ChatMessage;

/// Outgoing chat message; the payload reuses the stored discriminated union.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Typed payload.
    #[serde(flatten)]
    pub body: MessageBody,
}

/// Toggle the caller's reaction on a message.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ToggleReactionRequest {
    /// Emoji key to toggle.
    #[validate(length(min = 1, max = 16))]
    pub emoji: String,
}

/// Point the reply draft at a message.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReplyDraftRequest {
    /// Id of the message to reply to.
    #[validate(length(min = 1))]
    pub message_id: String,
}

/// Rendered message window of the active room.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessagesResponse {
    /// Messages oldest-first, capped to the subscription window.
    pub messages: Vec<ChatMessage>,
}
