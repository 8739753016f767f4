//! Pool, watched-set, filter and preference mutations.
//!
//! Every mutation follows the same path: authorization gate, local change,
//! local persist, scheduled remote save, UI broadcast.

use crate::{
    dao::documents::{Candidate, CandidateId, Prefs, WatchFilters},
    dao::sync_store::{DocPath, SyncStore},
    error::ServiceError,
    services::{events, sync_service},
    state::{Library, SharedState},
};

use serde::Serialize;
use tracing::warn;

/// Add a candidate to the front of the pool. Adding an id that is already
/// present is a no-op with a duplicate notice.
pub async fn add_candidate(state: &SharedState, candidate: Candidate) -> Result<(), ServiceError> {
    if !sync_service::require_auth_for_write(state).await {
        return Err(ServiceError::Unauthorized("sign in to edit this room".into()));
    }

    let added = {
        let mut library = state.library().write().await;
        let added = library.add_front(candidate);
        if added {
            library.persist_synced(state.local());
            events::broadcast_library_changed(state, &library);
        }
        added
    };

    if !added {
        events::notify_info(state, "Already in pool");
        return Ok(());
    }

    sync_service::schedule_save(state).await;
    events::notify_success(state, "Added to pool");
    Ok(())
}

/// Remove a candidate from the pool.
pub async fn remove_candidate(
    state: &SharedState,
    id: CandidateId,
) -> Result<(), ServiceError> {
    if !sync_service::require_auth_for_write(state).await {
        return Err(ServiceError::Unauthorized("sign in to edit this room".into()));
    }

    {
        let mut library = state.library().write().await;
        library.remove(id);
        library.persist_synced(state.local());
        events::broadcast_library_changed(state, &library);
    }

    sync_service::schedule_save(state).await;
    Ok(())
}

/// Flip the watched mark for a candidate id.
pub async fn toggle_watched(state: &SharedState, id: CandidateId) -> Result<(), ServiceError> {
    if !sync_service::require_auth_for_write(state).await {
        return Err(ServiceError::Unauthorized("sign in to edit this room".into()));
    }

    {
        let mut library = state.library().write().await;
        library.toggle_watched(id);
        library.persist_synced(state.local());
        events::broadcast_library_changed(state, &library);
    }

    sync_service::schedule_save(state).await;
    Ok(())
}

/// Empty the pool.
pub async fn clear_pool(state: &SharedState) -> Result<(), ServiceError> {
    if !sync_service::require_auth_for_write(state).await {
        return Err(ServiceError::Unauthorized("sign in to edit this room".into()));
    }

    {
        let mut library = state.library().write().await;
        library.clear_pool();
        library.persist_synced(state.local());
        events::broadcast_library_changed(state, &library);
    }

    sync_service::schedule_save(state).await;
    events::notify_info(state, "Pool cleared");
    Ok(())
}

/// Replace the filter predicate. Persists locally immediately; remote
/// mirroring rides the same debounced save as pool mutations.
pub async fn update_filters(state: &SharedState, filters: WatchFilters) -> Library {
    let snapshot = {
        let mut library = state.library().write().await;
        library.filters = filters;
        library.persist_synced(state.local());
        events::broadcast_library_changed(state, &library);
        library.clone()
    };

    sync_service::schedule_save(state).await;
    snapshot
}

#[derive(Serialize)]
struct SettingsPatch<'a> {
    settings: &'a Prefs,
}

/// Replace the preferences blob; mirrored straight into the personal
/// document when signed in (prefs never live on the room document).
pub async fn update_prefs(state: &SharedState, prefs: Prefs) -> Library {
    let snapshot = {
        let mut library = state.library().write().await;
        library.prefs = prefs;
        library.persist_prefs(state.local());
        events::broadcast_library_changed(state, &library);
        library.clone()
    };

    if let Some(uid) = state.session().current_id()
        && let Some(store) = state.sync_store().await
    {
        let patch = crate::dao::documents::to_document(&SettingsPatch {
            settings: &snapshot.prefs,
        });
        if let Err(err) = store.merge_doc(DocPath::User(uid), patch).await {
            warn!(error = %err, "failed to mirror preferences");
        }
    }

    snapshot
}

/// Current library snapshot.
pub async fn library_snapshot(state: &SharedState) -> Library {
    state.library().read().await.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sync_service::{create_room, handle_sign_out};
    use crate::test_support::{signed_in_state, test_candidate, test_state};

    #[tokio::test]
    async fn duplicate_add_keeps_the_pool_membership_unchanged() {
        let (state, _guard) = signed_in_state("alice").await;

        add_candidate(&state, test_candidate(5, 7.0)).await.unwrap();
        add_candidate(&state, test_candidate(5, 7.0)).await.unwrap();

        let library = state.library().read().await;
        let fives = library.pool.iter().filter(|c| c.id == 5).count();
        assert_eq!(fives, 1);
    }

    #[tokio::test]
    async fn adds_are_most_recent_first() {
        let (state, _guard) = signed_in_state("alice").await;
        add_candidate(&state, test_candidate(1, 7.0)).await.unwrap();
        add_candidate(&state, test_candidate(2, 7.0)).await.unwrap();

        let library = state.library().read().await;
        let ids: Vec<_> = library.pool.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn personal_pool_is_writable_while_signed_out() {
        let (state, _guard) = test_state().await;
        add_candidate(&state, test_candidate(1, 7.0)).await.unwrap();
        assert_eq!(state.library().read().await.pool.len(), 1);
    }

    #[tokio::test]
    async fn room_writes_require_an_identity() {
        let (state, _guard) = signed_in_state("alice").await;
        create_room(&state).await.unwrap();
        handle_sign_out(&state).await;

        let err = add_candidate(&state, test_candidate(1, 7.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert!(state.library().read().await.pool.is_empty());
    }

    #[tokio::test]
    async fn mutations_survive_a_reload_from_local_storage() {
        let (state, _guard) = signed_in_state("alice").await;
        add_candidate(&state, test_candidate(8, 9.0)).await.unwrap();
        toggle_watched(&state, 8).await.unwrap();

        let reloaded = Library::load(state.local());
        assert_eq!(reloaded.pool[0].id, 8);
        assert!(reloaded.watched.contains(&8));
    }
}
