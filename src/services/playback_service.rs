//! Shared playback position updates riding the room document.

use crate::{
    dao::documents::PlaybackState,
    dao::sync_store::{DocPath, Document, SyncStore},
    dto::rooms::PlaybackRequest,
    error::ServiceError,
    state::SharedState,
};

/// Merge-write this client's playback position into the room document.
/// Other participants apply it through the room listener; this client's own
/// copy is filtered out there by attribution.
pub async fn update_playback(
    state: &SharedState,
    request: PlaybackRequest,
) -> Result<PlaybackState, ServiceError> {
    let Some(room) = state.room().phase().await.room_id() else {
        return Err(ServiceError::InvalidState("not in a room".into()));
    };
    let store = state.sync_store().await.ok_or(ServiceError::Degraded)?;

    let playback = PlaybackState {
        media_id: request.media_id,
        media_type: request.media_type,
        position: request.position,
        is_playing: request.is_playing,
        updated_by: state.session().current_id(),
        updated_at: store.stamp_millis(),
    };

    // Our own write must never bounce back as an inbound change.
    state.room().advance_playback_stamp(playback.updated_at);

    let mut patch = Document::new();
    patch.insert(
        "playback".into(),
        serde_json::to_value(&playback).unwrap_or_default(),
    );
    store.merge_doc(DocPath::Room(room), patch).await?;
    Ok(playback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::documents::{MediaKind, RoomDocument, from_document};
    use crate::services::sync_service;
    use crate::test_support::signed_in_state;

    #[tokio::test]
    async fn playback_update_lands_on_the_room_document() {
        let (state, _guard) = signed_in_state("alice").await;
        let room = sync_service::create_room(&state).await.unwrap();

        let playback = update_playback(
            &state,
            PlaybackRequest {
                media_id: 603,
                media_type: MediaKind::Movie,
                position: 42.5,
                is_playing: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(playback.updated_by.as_deref(), Some("alice"));

        let store = state.sync_store().await.unwrap();
        let doc = store.get_doc(DocPath::Room(room)).await.unwrap().unwrap();
        let room_doc: RoomDocument = from_document(doc).unwrap();
        let stored = room_doc.playback.expect("playback stored");
        assert_eq!(stored.media_id, 603);
        assert!(stored.is_playing);
    }

    #[tokio::test]
    async fn playback_requires_a_room() {
        let (state, _guard) = signed_in_state("alice").await;
        let err = update_playback(
            &state,
            PlaybackRequest {
                media_id: 1,
                media_type: MediaKind::Movie,
                position: 0.0,
                is_playing: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
