//! Uniform-random pick over the filtered pool, optionally broadcast to the
//! active room.

use rand::Rng;
use uuid::Uuid;

use crate::{
    dao::documents::{Candidate, CandidateId, LastPick},
    dao::sync_store::{DocPath, Document, SyncStore},
    error::ServiceError,
    services::events,
    state::{RoomPhase, SharedState},
};

/// Outcome of a pick draw.
#[derive(Debug, Clone)]
pub struct PickOutcome {
    /// The chosen candidate.
    pub candidate: Candidate,
    /// Whether the pick was written to the active room document.
    pub broadcast: bool,
}

/// Draw a candidate.
///
/// The filter predicate applies first; when it empties the pool the draw
/// falls back to the whole pool. `avoid` implements reroll: the previous
/// pick is excluded unless doing so would leave nothing to draw. A pool
/// that is empty either way surfaces a user notice and fails soft.
pub async fn pick(
    state: &SharedState,
    avoid: Option<CandidateId>,
) -> Result<PickOutcome, ServiceError> {
    let mut candidates = {
        let library = state.library().read().await;
        let filtered = library.candidates();
        if filtered.is_empty() {
            library.pool.clone()
        } else {
            filtered
        }
    };

    if candidates.is_empty() {
        events::notify_error(state, "No movies in the pool to pick from.");
        return Err(ServiceError::InvalidInput("the pool is empty".into()));
    }

    // Reroll: skip the avoided id unless it is the only thing left.
    if let Some(avoid) = avoid
        && candidates.len() > 1
    {
        let remaining: Vec<Candidate> = candidates
            .iter()
            .filter(|candidate| candidate.id != avoid)
            .cloned()
            .collect();
        if !remaining.is_empty() {
            candidates = remaining;
        }
    }

    let index = rand::rng().random_range(0..candidates.len());
    let chosen = candidates[index].clone();
    state.set_last_pick(Some(chosen.id));

    let broadcast = match state.room().phase().await {
        RoomPhase::Unjoined => false,
        RoomPhase::InRoom(room) => {
            broadcast_pick(state, room, &chosen).await?;
            true
        }
    };

    Ok(PickOutcome {
        candidate: chosen,
        broadcast,
    })
}

/// Reroll: draw again while avoiding the previous pick when possible.
pub async fn reroll(state: &SharedState) -> Result<PickOutcome, ServiceError> {
    let avoid = state.last_pick();
    pick(state, avoid).await
}

/// Write the pick record to the room document so every participant's
/// listener reacts to it. Requires a signed-in identity.
async fn broadcast_pick(
    state: &SharedState,
    room: Uuid,
    chosen: &Candidate,
) -> Result<(), ServiceError> {
    let Some(identity) = state.session().current() else {
        events::notify_info(state, "Sign in to pick in this room.");
        return Err(ServiceError::Unauthorized(
            "sign in to pick in this room".into(),
        ));
    };
    let store = state.sync_store().await.ok_or(ServiceError::Degraded)?;

    let pick = LastPick {
        pick_id: Uuid::new_v4(),
        candidate_id: chosen.id,
        title: Some(chosen.title.clone()),
        media_type: chosen.media_type,
        picked_by: identity.id,
        picked_at: store.stamp_millis(),
    };

    // Our own listener will see this snapshot too; marking the pick seen now
    // keeps the picker from double-opening it.
    state.room().mark_pick_seen(pick.pick_id);
    events::broadcast_pick_made(state, &pick);

    let mut patch = Document::new();
    patch.insert(
        "lastPick".into(),
        serde_json::to_value(&pick).unwrap_or_default(),
    );
    store.merge_doc(DocPath::Room(room), patch).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::documents::{RoomDocument, from_document};
    use crate::services::sync_service;
    use crate::test_support::{signed_in_state, test_candidate, test_state};
    use std::collections::HashSet;

    #[tokio::test]
    async fn empty_pool_fails_soft() {
        let (state, _guard) = test_state().await;
        let err = pick(&state, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn filtered_single_candidate_is_deterministic() {
        let (state, _guard) = test_state().await;
        {
            let mut library = state.library().write().await;
            library.add_front(test_candidate(1, 7.0));
            library.add_front(test_candidate(2, 5.0));
        }

        for _ in 0..8 {
            let outcome = pick(&state, None).await.unwrap();
            assert_eq!(outcome.candidate.id, 1);
            assert!(!outcome.broadcast);
        }
    }

    #[tokio::test]
    async fn pick_never_leaves_the_candidate_set() {
        let (state, _guard) = test_state().await;
        let ids: HashSet<CandidateId> = (1..=6).collect();
        {
            let mut library = state.library().write().await;
            for id in &ids {
                library.add_front(test_candidate(*id, 8.0));
            }
        }

        for _ in 0..32 {
            let outcome = pick(&state, None).await.unwrap();
            assert!(ids.contains(&outcome.candidate.id));
        }
    }

    #[tokio::test]
    async fn filters_excluding_everything_fall_back_to_the_pool() {
        let (state, _guard) = test_state().await;
        {
            let mut library = state.library().write().await;
            library.add_front(test_candidate(3, 4.0));
        }

        let outcome = pick(&state, None).await.unwrap();
        assert_eq!(outcome.candidate.id, 3);
    }

    #[tokio::test]
    async fn avoid_id_is_ignored_when_it_would_empty_the_draw() {
        let (state, _guard) = test_state().await;
        {
            let mut library = state.library().write().await;
            library.add_front(test_candidate(9, 8.0));
        }

        let outcome = pick(&state, Some(9)).await.unwrap();
        assert_eq!(outcome.candidate.id, 9, "sole candidate may repeat");
    }

    #[tokio::test]
    async fn reroll_avoids_the_previous_pick() {
        let (state, _guard) = test_state().await;
        {
            let mut library = state.library().write().await;
            library.add_front(test_candidate(1, 8.0));
            library.add_front(test_candidate(2, 8.0));
        }

        let first = pick(&state, None).await.unwrap().candidate.id;
        for _ in 0..8 {
            let next = reroll(&state).await.unwrap().candidate.id;
            assert_ne!(next, first);
            // Re-arm so every iteration rerolls away from the same pick.
            state.set_last_pick(Some(first));
        }
    }

    #[tokio::test]
    async fn in_room_pick_writes_the_record() {
        let (state, _guard) = signed_in_state("alice").await;
        {
            let mut library = state.library().write().await;
            library.add_front(test_candidate(603, 8.2));
        }
        let room = sync_service::create_room(&state).await.unwrap();

        let outcome = pick(&state, None).await.unwrap();
        assert!(outcome.broadcast);

        let store = state.sync_store().await.unwrap();
        let doc = store.get_doc(DocPath::Room(room)).await.unwrap().unwrap();
        let room_doc: RoomDocument = from_document(doc).unwrap();
        let pick_record = room_doc.last_pick.expect("pick recorded");
        assert_eq!(pick_record.candidate_id, 603);
        assert_eq!(pick_record.picked_by, "alice");
        assert!(pick_record.picked_at > 0);
    }
}
