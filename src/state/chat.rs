//! Client-side chat bookkeeping: the rendered message window, the reply
//! draft, and the duplicate-send guard.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::dao::documents::MessageDocument;

/// Window within which an identical resend is treated as a double-submit.
pub const DUPLICATE_SEND_WINDOW: Duration = Duration::from_secs(1);

/// A message as rendered: document payload plus its id and server stamp.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChatMessage {
    /// Store-assigned message id.
    pub id: String,
    /// Server-assigned creation stamp, milliseconds.
    pub created_at_ms: u64,
    /// Message payload.
    #[serde(flatten)]
    pub doc: MessageDocument,
}

/// Chat runtime state for the active room.
#[derive(Debug, Default)]
pub struct ChatState {
    messages: RwLock<Vec<ChatMessage>>,
    reply_draft: Mutex<Option<ChatMessage>>,
    last_send: Mutex<Option<(String, Instant)>>,
}

impl ChatState {
    /// Replace the rendered window with a fresh subscription snapshot.
    pub async fn set_messages(&self, messages: Vec<ChatMessage>) {
        *self.messages.write().await = messages;
    }

    /// Clone the rendered window.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    /// Look a message up by id in the rendered window.
    pub async fn find(&self, id: &str) -> Option<ChatMessage> {
        self.messages
            .read()
            .await
            .iter()
            .find(|message| message.id == id)
            .cloned()
    }

    /// Point the reply draft at a message.
    pub fn set_reply_draft(&self, target: ChatMessage) {
        *self.reply_draft.lock().expect("chat state poisoned") = Some(target);
    }

    /// Clear the reply draft, returning what it pointed at.
    pub fn take_reply_draft(&self) -> Option<ChatMessage> {
        self.reply_draft.lock().expect("chat state poisoned").take()
    }

    /// Current reply draft without clearing it.
    pub fn reply_draft(&self) -> Option<ChatMessage> {
        self.reply_draft
            .lock()
            .expect("chat state poisoned")
            .clone()
    }

    /// Double-submit guard: `true` when `text` matches the immediately
    /// previous send within [`DUPLICATE_SEND_WINDOW`]. Records the send
    /// otherwise.
    pub fn should_drop_duplicate(&self, text: &str) -> bool {
        let mut slot = self.last_send.lock().expect("chat state poisoned");
        let now = Instant::now();
        if let Some((last_text, at)) = slot.as_ref()
            && last_text == text
            && now.duration_since(*at) < DUPLICATE_SEND_WINDOW
        {
            return true;
        }
        *slot = Some((text.to_string(), now));
        false
    }

    /// Drop everything room-scoped on leave.
    pub async fn reset(&self) {
        self.messages.write().await.clear();
        self.take_reply_draft();
        self.last_send.lock().expect("chat state poisoned").take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_guard_drops_identical_rapid_sends() {
        let chat = ChatState::default();
        assert!(!chat.should_drop_duplicate("hello"));
        assert!(chat.should_drop_duplicate("hello"));
        assert!(!chat.should_drop_duplicate("different"));
        // Same text again, but the previous send was "different".
        assert!(!chat.should_drop_duplicate("hello"));
    }
}
