//! Room synchronization: the save path, the remote listeners and the room
//! lifecycle.
//!
//! One client is either room-scoped or personal-scoped, never both; the
//! active document listener follows that choice. Outbound saves are
//! debounced and attributed with `{updatedBy, clientWriteId}` so the
//! listener can discard the echo of this client's own writes.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::documents::{
        Candidate, CandidateId, RoomDocument, UserDocument, WatchFilters, from_document,
        to_document,
    },
    dao::sync_store::{ColPath, CollectionQuery, DocPath, Document, SyncStore},
    error::ServiceError,
    services::{collection_service, events, message_service, presence_service},
    state::{Library, RoomPhase, SharedState, room::ListenerKind, session::Identity},
};

/// Debounce window for personal-document saves; rapid local edits batch up.
const PERSONAL_SAVE_DEBOUNCE: Duration = Duration::from_millis(400);
/// Room saves flush immediately: shared state favors chat-like latency.
const ROOM_SAVE_DEBOUNCE: Duration = Duration::ZERO;

/// Document the client currently synchronizes against: the room document
/// when in a room, else the personal document. `None` when unjoined and
/// signed out — callers treat that as "no remote sync available".
pub async fn active_doc_path(state: &SharedState) -> Option<DocPath> {
    match state.room().phase().await {
        RoomPhase::InRoom(id) => Some(DocPath::Room(id)),
        RoomPhase::Unjoined => state.session().current_id().map(DocPath::User),
    }
}

/// The sole client-side authorization gate: personal state is always
/// writable, shared rooms require a signed-in identity. Surfaces a sign-in
/// prompt and returns `false` when the gate is closed.
pub async fn require_auth_for_write(state: &SharedState) -> bool {
    match state.room().phase().await {
        RoomPhase::Unjoined => true,
        RoomPhase::InRoom(_) => {
            if state.session().current().is_some() {
                true
            } else {
                events::notify_info(state, "Sign in to edit this room.");
                false
            }
        }
    }
}

/// Schedule a debounced merge-write of the library to the active document.
///
/// No-op while signed out and while a remote snapshot is being applied (the
/// reentrancy guard that keeps the listener from echoing into the save
/// path). Concurrent calls collapse into one pending write.
pub async fn schedule_save(state: &SharedState) {
    if state.session().current().is_none() {
        return;
    }
    if state.room().is_applying_remote() {
        return;
    }

    let delay = match state.room().phase().await {
        RoomPhase::InRoom(_) => ROOM_SAVE_DEBOUNCE,
        RoomPhase::Unjoined => PERSONAL_SAVE_DEBOUNCE,
    };

    let cloned = state.clone();
    state
        .save_debouncer()
        .schedule(delay, move || perform_save(cloned));
}

#[derive(Serialize)]
struct SavePatch<'a> {
    pool: &'a [Candidate],
    watched: Vec<CandidateId>,
    filters: &'a WatchFilters,
    #[serde(rename = "updatedBy")]
    updated_by: &'a str,
    #[serde(rename = "clientWriteId")]
    client_write_id: u64,
}

async fn perform_save(state: SharedState) {
    let Some(identity) = state.session().current() else {
        return;
    };
    let Some(path) = active_doc_path(&state).await else {
        return;
    };
    let Some(store) = state.sync_store().await else {
        debug!("skipping remote save while degraded");
        return;
    };

    let write_id = state.room().next_write_id();
    let patch = {
        let library = state.library().read().await;
        to_document(&SavePatch {
            pool: &library.pool,
            watched: library.watched_vec(),
            filters: &library.filters,
            updated_by: &identity.id,
            client_write_id: write_id,
        })
    };

    // Failures are logged only; the next natural save retries.
    if let Err(err) = store.merge_doc(path, patch).await {
        warn!(error = %err, "remote save failed");
    }
}

/// Seed the personal document on first sign-in so a fresh device starts
/// from the local snapshot.
pub async fn ensure_user_doc(state: &SharedState) {
    let Some(identity) = state.session().current() else {
        return;
    };
    let Some(store) = state.sync_store().await else {
        return;
    };

    let path = DocPath::User(identity.id.clone());
    match store.get_doc(path.clone()).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let seed = {
                let library = state.library().read().await;
                to_document(&UserDocument {
                    pool: library.pool.clone(),
                    watched: library.watched_vec(),
                    filters: library.filters.clone(),
                    settings: Some(library.prefs.clone()),
                    updated_by: None,
                    client_write_id: None,
                })
            };
            if let Err(err) = store.merge_doc(path, seed).await {
                warn!(error = %err, "failed to seed personal document");
            }
        }
        Err(err) => warn!(error = %err, "failed to probe personal document"),
    }
}

/// Install the personal-document listener (replacing any active-doc
/// listener) and seed the document when missing.
pub async fn resume_personal_sync(state: &SharedState) {
    if !matches!(state.room().phase().await, RoomPhase::Unjoined) {
        return;
    }
    if state.session().current().is_none() {
        return;
    }
    ensure_user_doc(state).await;
    start_user_doc_listener(state);
}

/// Record a sign-in and wire up whatever sync scope applies.
pub async fn handle_sign_in(state: &SharedState, identity: Identity) {
    state.session().sign_in(identity);
    events::broadcast_session_changed(state, &state.session().current());

    match state.room().phase().await {
        RoomPhase::Unjoined => resume_personal_sync(state).await,
        // Already in a room: announce ourselves to the membership list.
        RoomPhase::InRoom(room) => presence_service::heartbeat_once(state, room).await,
    }

    collection_service::restore_collections(state).await;
}

/// Record a sign-out. Room membership (if any) is kept; the client keeps
/// reading the room anonymously.
pub async fn handle_sign_out(state: &SharedState) {
    state.session().sign_out();
    events::broadcast_session_changed(state, &None);

    if matches!(state.room().phase().await, RoomPhase::Unjoined) {
        state.room().listeners().stop(ListenerKind::ActiveDoc);
    }
}

/// Create a room seeded with the current library and join it. Requires a
/// signed-in identity.
pub async fn create_room(state: &SharedState) -> Result<Uuid, ServiceError> {
    let Some(identity) = state.session().current() else {
        events::notify_info(state, "Sign in to create a room.");
        return Err(ServiceError::Unauthorized("sign in to create a room".into()));
    };
    let store = state.sync_store().await.ok_or(ServiceError::Degraded)?;

    let room = Uuid::new_v4();
    let seed = {
        let library = state.library().read().await;
        to_document(&RoomDocument {
            owner_uid: Some(identity.id.clone()),
            pool: library.pool.clone(),
            watched: library.watched_vec(),
            filters: library.filters.clone(),
            last_pick: None,
            playback: None,
            updated_by: None,
            client_write_id: None,
        })
    };
    store.merge_doc(DocPath::Room(room), seed).await?;

    enter_room(state, room).await?;
    Ok(room)
}

/// Join a room by id, e.g. from a shared link. No ownership check; joining
/// tears down the personal listener and starts every room-scoped listener.
pub async fn join_room(state: &SharedState, room: Uuid) -> Result<(), ServiceError> {
    if let RoomPhase::InRoom(current) = state.room().phase().await {
        if current == room {
            return Ok(());
        }
        leave_room(state).await?;
    }
    enter_room(state, room).await
}

async fn enter_room(state: &SharedState, room: Uuid) -> Result<(), ServiceError> {
    state.room().listeners().stop(ListenerKind::ActiveDoc);
    state.room().machine().write().await.join(room)?;

    start_room_listener(state, room);
    presence_service::start_members_listener(state, room);
    presence_service::start_heartbeat(state, room);
    message_service::start_messages_listener(state, room);

    events::broadcast_room_changed(state).await;
    Ok(())
}

/// Leave the active room: best-effort membership cleanup, full listener
/// teardown, and restore of the pre-room local state.
pub async fn leave_room(state: &SharedState) -> Result<(), ServiceError> {
    let room = state.room().machine().write().await.leave()?;

    if let Some(uid) = state.session().current_id()
        && let Some(store) = state.sync_store().await
        && let Err(err) = store.delete_doc(DocPath::Member { room, user: uid }).await
    {
        warn!(error = %err, "failed to delete membership record");
    }

    state.save_debouncer().cancel();
    state.room().listeners().stop_all();
    state.room().reset_room_scoped().await;
    state.chat().reset().await;
    state.set_last_pick(None);

    // The room's shared view is discarded; local storage is authoritative
    // again.
    {
        let mut library = state.library().write().await;
        *library = Library::load(state.local());
        events::broadcast_library_changed(state, &library);
    }

    events::broadcast_room_changed(state).await;

    if state.session().current().is_some() {
        resume_personal_sync(state).await;
    }
    Ok(())
}

/// Delete the active room. Owner-only; the remote store's security rules
/// are the real enforcement, this is the client-side gate. Membership and
/// message sub-collections are swept before the room document itself, then
/// the client falls back to personal state like a normal leave.
pub async fn delete_room(state: &SharedState) -> Result<(), ServiceError> {
    let RoomPhase::InRoom(room) = state.room().phase().await else {
        return Err(ServiceError::InvalidState("not in a room".into()));
    };
    let Some(identity) = state.session().current() else {
        return Err(ServiceError::Unauthorized("sign in to delete a room".into()));
    };
    let store = state.sync_store().await.ok_or(ServiceError::Degraded)?;

    let Some(doc) = store.get_doc(DocPath::Room(room)).await? else {
        return Err(ServiceError::NotFound(format!("room `{room}` not found")));
    };
    let room_doc: RoomDocument = from_document(doc)
        .map_err(|err| ServiceError::InvalidState(format!("malformed room: {err}")))?;
    if room_doc.owner_uid.as_deref() != Some(identity.id.as_str()) {
        return Err(ServiceError::Unauthorized(
            "only the room owner can delete it".into(),
        ));
    }

    for col in [ColPath::Members(room), ColPath::Messages(room)] {
        for (id, _) in store.query(col, CollectionQuery::default()).await? {
            if let Err(err) = store.delete_doc(col.doc(&id)).await {
                warn!(error = %err, collection = %col, "cascade delete failed");
            }
        }
    }
    store.delete_doc(DocPath::Room(room)).await?;

    leave_room(state).await
}

/// Canonical join link for a room.
pub fn room_share_url(state: &SharedState, room: Uuid) -> String {
    format!("{}?room={room}", state.config().frontend_url)
}

fn start_room_listener(state: &SharedState, room: Uuid) {
    let task = tokio::spawn(run_room_listener(state.clone(), room));
    state
        .room()
        .listeners()
        .install(ListenerKind::ActiveDoc, task);
}

fn start_user_doc_listener(state: &SharedState) {
    let Some(uid) = state.session().current_id() else {
        return;
    };
    let task = tokio::spawn(run_user_doc_listener(state.clone(), uid));
    state
        .room()
        .listeners()
        .install(ListenerKind::ActiveDoc, task);
}

async fn run_room_listener(state: SharedState, room: Uuid) {
    let Some(store) = state.sync_store().await else {
        return;
    };
    let mut sub = match store.watch_doc(DocPath::Room(room)).await {
        Ok(sub) => sub,
        Err(err) => {
            warn!(error = %err, "room listener failed to attach");
            events::notify_error(&state, "Failed to load room.");
            return;
        }
    };

    loop {
        match sub.latest() {
            Ok(Some(doc)) => apply_room_snapshot(&state, doc).await,
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "room listener failed");
                events::notify_error(&state, "Failed to load room.");
            }
        }
        if !sub.changed().await {
            break;
        }
    }
}

async fn run_user_doc_listener(state: SharedState, uid: String) {
    let Some(store) = state.sync_store().await else {
        return;
    };
    let mut sub = match store.watch_doc(DocPath::User(uid)).await {
        Ok(sub) => sub,
        Err(err) => {
            warn!(error = %err, "personal listener failed to attach");
            events::notify_error(&state, "Error loading data from the cloud.");
            return;
        }
    };

    loop {
        match sub.latest() {
            Ok(Some(doc)) => apply_user_snapshot(&state, doc).await,
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "personal listener failed");
                events::notify_error(&state, "Error loading data from the cloud.");
            }
        }
        if !sub.changed().await {
            break;
        }
    }
}

/// Own-write echo check: a snapshot attributed to this identity whose write
/// id does not exceed the last id this client issued is this client's own
/// (possibly superseded) write, already applied locally.
fn is_own_echo(
    state: &SharedState,
    updated_by: Option<&String>,
    client_write_id: Option<u64>,
) -> bool {
    let Some(self_id) = state.session().current_id() else {
        return false;
    };
    matches!(
        (updated_by, client_write_id),
        (Some(by), Some(write_id))
            if *by == self_id && write_id <= state.room().last_issued_write_id()
    )
}

async fn apply_room_snapshot(state: &SharedState, doc: Document) {
    let room_doc: RoomDocument = match from_document(doc) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "discarding malformed room snapshot");
            return;
        }
    };

    // Group pick: dedupe by pick id so each broadcast opens once per client.
    if let Some(pick) = &room_doc.last_pick
        && state.room().mark_pick_seen(pick.pick_id)
    {
        state.set_last_pick(Some(pick.candidate_id));
        events::broadcast_pick_made(state, pick);
    }

    if is_own_echo(
        state,
        room_doc.updated_by.as_ref(),
        room_doc.client_write_id,
    ) {
        return;
    }

    // Playback: skip own updates and anything older than what was applied.
    if let Some(playback) = &room_doc.playback {
        let own = match (&state.session().current_id(), &playback.updated_by) {
            (Some(self_id), Some(by)) => self_id == by,
            _ => false,
        };
        if !own
            && playback.updated_at > 0
            && state.room().advance_playback_stamp(playback.updated_at)
        {
            events::broadcast_playback_changed(state, playback);
        }
    }

    let _guard = state.room().begin_apply_remote();
    let mut library = state.library().write().await;
    library.apply_remote(room_doc.pool, room_doc.watched, room_doc.filters);
    library.persist_synced(state.local());
    events::broadcast_library_changed(state, &library);
}

async fn apply_user_snapshot(state: &SharedState, doc: Document) {
    let user_doc: UserDocument = match from_document(doc) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "discarding malformed personal snapshot");
            return;
        }
    };

    if is_own_echo(
        state,
        user_doc.updated_by.as_ref(),
        user_doc.client_write_id,
    ) {
        return;
    }

    let _guard = state.room().begin_apply_remote();
    let mut library = state.library().write().await;
    if let Some(prefs) = user_doc.settings {
        library.prefs = prefs;
        library.persist_prefs(state.local());
    }
    library.apply_remote(user_doc.pool, user_doc.watched, user_doc.filters);
    library.persist_synced(state.local());
    events::broadcast_library_changed(state, &library);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::documents::MediaKind;
    use crate::dao::sync_store::{ColPath, CollectionQuery, SyncStore, memory::MemoryStore};
    use crate::services::pool_service;
    use crate::test_support::{signed_in_state, test_candidate, test_state};
    use std::sync::Arc;
    use tokio::time::{Duration, sleep};

    #[tokio::test]
    async fn echo_of_own_write_is_discarded() {
        let (state, _guard) = signed_in_state("alice").await;

        {
            let mut library = state.library().write().await;
            library.add_front(test_candidate(1, 7.0));
        }

        // A save was issued: counter at 1.
        let issued = state.room().next_write_id();

        let echo = to_document(&RoomDocument {
            pool: vec![test_candidate(99, 9.0)],
            updated_by: Some("alice".into()),
            client_write_id: Some(issued),
            ..RoomDocument::default()
        });
        apply_room_snapshot(&state, echo).await;

        let library = state.library().read().await;
        assert_eq!(library.pool.len(), 1);
        assert_eq!(library.pool[0].id, 1, "own echo must not overwrite state");
        assert!(state.save_debouncer().is_idle(), "echo must not re-schedule a save");
    }

    #[tokio::test]
    async fn newer_write_from_same_identity_is_applied() {
        let (state, _guard) = signed_in_state("alice").await;
        let issued = state.room().next_write_id();

        // Same identity on another device: a write id we never issued.
        let remote = to_document(&RoomDocument {
            pool: vec![test_candidate(42, 8.0)],
            updated_by: Some("alice".into()),
            client_write_id: Some(issued + 1),
            ..RoomDocument::default()
        });
        apply_room_snapshot(&state, remote).await;

        let library = state.library().read().await;
        assert_eq!(library.pool[0].id, 42);
    }

    #[tokio::test]
    async fn schedule_save_is_a_no_op_while_applying_remote() {
        let (state, _guard) = signed_in_state("alice").await;
        {
            let _apply = state.room().begin_apply_remote();
            schedule_save(&state).await;
        }
        assert!(state.save_debouncer().is_idle());
    }

    #[tokio::test]
    async fn schedule_save_requires_an_identity() {
        let (state, _guard) = test_state().await;
        schedule_save(&state).await;
        assert!(state.save_debouncer().is_idle());
    }

    #[tokio::test]
    async fn leaving_a_room_restores_the_local_library() {
        let (state, _guard) = signed_in_state("alice").await;

        {
            let mut library = state.library().write().await;
            library.add_front(test_candidate(1, 7.5));
            library.persist_synced(state.local());
        }

        let room = create_room(&state).await.unwrap();
        assert_eq!(state.room().phase().await, RoomPhase::InRoom(room));
        // Let the room listener apply its initial snapshot before simulating
        // a remote overwrite.
        sleep(Duration::from_millis(50)).await;

        // A remote snapshot replaces the shared view entirely.
        {
            let mut library = state.library().write().await;
            library.apply_remote(vec![test_candidate(2, 6.5)], vec![2], Default::default());
        }
        assert_eq!(state.library().read().await.pool[0].id, 2);

        leave_room(&state).await.unwrap();
        assert_eq!(state.room().phase().await, RoomPhase::Unjoined);

        let library = state.library().read().await;
        assert_eq!(library.pool.len(), 1);
        assert_eq!(library.pool[0].id, 1, "room state must not leak after leave");
        assert!(library.watched.is_empty());
    }

    #[tokio::test]
    async fn concurrent_adds_from_two_clients_keep_the_id_once() {
        let store = MemoryStore::new();
        let (state_a, _guard_a) = test_state().await;
        let (state_b, _guard_b) = test_state().await;
        state_a
            .install_sync_store(Arc::new(store.clone()))
            .await;
        state_b
            .install_sync_store(Arc::new(store.clone()))
            .await;

        handle_sign_in(
            &state_a,
            Identity {
                id: "alice".into(),
                display_name: "Alice".into(),
                avatar_url: None,
            },
        )
        .await;
        handle_sign_in(
            &state_b,
            Identity {
                id: "bob".into(),
                display_name: "Bob".into(),
                avatar_url: None,
            },
        )
        .await;

        let room = create_room(&state_a).await.unwrap();
        join_room(&state_b, room).await.unwrap();

        let candidate = test_candidate(5, 7.0);
        pool_service::add_candidate(&state_a, candidate.clone())
            .await
            .unwrap();
        pool_service::add_candidate(&state_b, candidate).await.unwrap();

        // Let both debounced saves land and fan back out.
        sleep(Duration::from_millis(200)).await;

        let doc = store
            .get_doc(DocPath::Room(room))
            .await
            .unwrap()
            .expect("room document exists");
        let room_doc: RoomDocument = from_document(doc).unwrap();
        let fives = room_doc.pool.iter().filter(|c| c.id == 5).count();
        assert_eq!(fives, 1, "last writer's blob still contains id 5 exactly once");
    }

    #[tokio::test]
    async fn active_path_is_none_when_signed_out_and_unjoined() {
        let (state, _guard) = test_state().await;
        assert_eq!(active_doc_path(&state).await, None);
    }

    #[tokio::test]
    async fn room_seed_carries_the_local_pool() {
        let (state, _guard) = signed_in_state("alice").await;
        {
            let mut library = state.library().write().await;
            library.add_front(test_candidate(7, 8.0));
        }
        let room = create_room(&state).await.unwrap();

        let store = state.sync_store().await.unwrap();
        let doc = store.get_doc(DocPath::Room(room)).await.unwrap().unwrap();
        let room_doc: RoomDocument = from_document(doc).unwrap();
        assert_eq!(room_doc.owner_uid.as_deref(), Some("alice"));
        assert_eq!(room_doc.pool[0].id, 7);
        assert_eq!(room_doc.pool[0].media_type, MediaKind::Movie);
    }

    #[tokio::test]
    async fn messages_are_scoped_per_room() {
        // Regression guard for the collection path layout: two rooms never
        // share a messages collection.
        let store = MemoryStore::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();
        store
            .add_doc(
                ColPath::Messages(room_a),
                to_document(&serde_json::json!({"text": "hi"})),
            )
            .await
            .unwrap();
        let rows = store
            .query(ColPath::Messages(room_b), CollectionQuery::default())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
