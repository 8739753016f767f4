//! Typed broadcast helpers pushing engine state changes onto the UI event
//! stream.

use serde::Serialize;
use tracing::warn;

use crate::{
    dao::documents::{LastPick, PlaybackState, SavedCollection},
    dto::{
        common::RoomPhaseSnapshot,
        sse::{Notice, ServerEvent, SystemStatus},
    },
    state::{SharedState, chat::ChatMessage, library::Library, room::Member, session::Identity},
};

const EVENT_NOTICE: &str = "notice";
const EVENT_SYSTEM_STATUS: &str = "system.status";
const EVENT_SESSION_CHANGED: &str = "session.changed";
const EVENT_LIBRARY_CHANGED: &str = "library.changed";
const EVENT_ROOM_CHANGED: &str = "room.changed";
const EVENT_MEMBERS_CHANGED: &str = "members.changed";
const EVENT_MESSAGES_CHANGED: &str = "messages.changed";
const EVENT_PICK_MADE: &str = "pick.made";
const EVENT_PLAYBACK_CHANGED: &str = "playback.changed";
const EVENT_COLLECTIONS_CHANGED: &str = "collections.changed";

/// Transient informational toast.
pub fn notify_info(state: &SharedState, message: impl Into<String>) {
    notify(state, "info", message.into());
}

/// Transient success toast.
pub fn notify_success(state: &SharedState, message: impl Into<String>) {
    notify(state, "success", message.into());
}

/// Transient error toast; the engine keeps running on last-known-good state.
pub fn notify_error(state: &SharedState, message: impl Into<String>) {
    notify(state, "error", message.into());
}

fn notify(state: &SharedState, level: &'static str, message: String) {
    send_event(state, EVENT_NOTICE, &Notice { level, message });
}

/// Broadcast the degraded flag whenever it flips.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Broadcast an identity change (sign-in, sign-out).
pub fn broadcast_session_changed(state: &SharedState, identity: &Option<Identity>) {
    send_event(state, EVENT_SESSION_CHANGED, identity);
}

/// Broadcast a fresh library snapshot after any pool/filter change.
pub fn broadcast_library_changed(state: &SharedState, library: &Library) {
    send_event(state, EVENT_LIBRARY_CHANGED, library);
}

/// Broadcast a room lifecycle change.
pub async fn broadcast_room_changed(state: &SharedState) {
    let snapshot = RoomPhaseSnapshot::from(state.room().phase().await);
    send_event(state, EVENT_ROOM_CHANGED, &snapshot);
}

/// Broadcast the classified membership list.
pub fn broadcast_members_changed(state: &SharedState, members: &[Member]) {
    send_event(state, EVENT_MEMBERS_CHANGED, &members);
}

/// Broadcast the rendered message window.
pub fn broadcast_messages_changed(state: &SharedState, messages: &[ChatMessage]) {
    send_event(state, EVENT_MESSAGES_CHANGED, &messages);
}

/// Broadcast a group pick so every client can open the chosen title.
pub fn broadcast_pick_made(state: &SharedState, pick: &LastPick) {
    send_event(state, EVENT_PICK_MADE, pick);
}

/// Broadcast an inbound playback update.
pub fn broadcast_playback_changed(state: &SharedState, playback: &PlaybackState) {
    send_event(state, EVENT_PLAYBACK_CHANGED, playback);
}

/// Broadcast the saved collections after a mutation.
pub fn broadcast_collections_changed(state: &SharedState, collections: &[SavedCollection]) {
    send_event(state, EVENT_COLLECTIONS_CHANGED, &collections);
}

fn send_event<T: Serialize>(state: &SharedState, name: &str, payload: &T) {
    match ServerEvent::json(Some(name.to_string()), payload) {
        Ok(event) => state.events().broadcast(event),
        Err(err) => warn!(event = name, error = %err, "failed to serialize UI event"),
    }
}
