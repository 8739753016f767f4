//! Saved collections and standalone shared pool snapshots.
//!
//! Collections follow the same mirroring pattern as the pool: authoritative
//! copy on device, wholesale mirror to a per-identity remote document when
//! signed in.

use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::documents::{
        Candidate, CollectionSetDocument, SavedCollection, SharedListDocument, from_document,
        to_document,
    },
    dao::local::KEY_COLLECTIONS,
    dao::sync_store::{DocPath, SyncStore},
    error::ServiceError,
    services::{events, sync_service},
    state::SharedState,
};

/// Load the saved collections from local storage.
pub fn saved_collections(state: &SharedState) -> Vec<SavedCollection> {
    state.local().load_json(KEY_COLLECTIONS, Vec::new())
}

/// Create a named collection from the given entries, newest first.
pub async fn create_collection(
    state: &SharedState,
    name: String,
    entries: Vec<Candidate>,
) -> Result<SavedCollection, ServiceError> {
    let created_at = match state.sync_store().await {
        Some(store) => store.stamp_millis(),
        None => 0,
    };
    let collection = SavedCollection {
        id: Uuid::new_v4(),
        name,
        entries,
        created_at,
    };

    let mut collections = saved_collections(state);
    collections.insert(0, collection.clone());
    persist_and_mirror(state, &collections).await;

    events::notify_success(state, "Collection saved");
    Ok(collection)
}

/// Delete a collection by id.
pub async fn delete_collection(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let mut collections = saved_collections(state);
    let before = collections.len();
    collections.retain(|collection| collection.id != id);
    if collections.len() == before {
        return Err(ServiceError::NotFound(format!("collection `{id}` not found")));
    }

    persist_and_mirror(state, &collections).await;
    Ok(())
}

async fn persist_and_mirror(state: &SharedState, collections: &[SavedCollection]) {
    state.local().save_json(KEY_COLLECTIONS, &collections);
    events::broadcast_collections_changed(state, collections);

    if let Some(uid) = state.session().current_id()
        && let Some(store) = state.sync_store().await
    {
        let patch = to_document(&CollectionSetDocument {
            collections: collections.to_vec(),
        });
        if let Err(err) = store.merge_doc(DocPath::CollectionSet(uid), patch).await {
            warn!(error = %err, "failed to mirror collections");
        }
    }
}

/// Pull the remote mirror after sign-in, when it holds anything newer than
/// an empty local set.
pub async fn restore_collections(state: &SharedState) {
    let Some(uid) = state.session().current_id() else {
        return;
    };
    let Some(store) = state.sync_store().await else {
        return;
    };

    match store.get_doc(DocPath::CollectionSet(uid)).await {
        Ok(Some(doc)) => match from_document::<CollectionSetDocument>(doc) {
            Ok(remote) if !remote.collections.is_empty() => {
                state.local().save_json(KEY_COLLECTIONS, &remote.collections);
                events::broadcast_collections_changed(state, &remote.collections);
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "malformed remote collections"),
        },
        Ok(None) => {}
        Err(err) => warn!(error = %err, "failed to fetch remote collections"),
    }
}

/// Mint a standalone snapshot of the current library for sharing. Requires
/// a signed-in identity.
pub async fn create_shared_list(state: &SharedState) -> Result<(Uuid, String), ServiceError> {
    if state.session().current().is_none() {
        events::notify_error(state, "Sign in to share your list.");
        return Err(ServiceError::Unauthorized("sign in to share".into()));
    }
    let store = state.sync_store().await.ok_or(ServiceError::Degraded)?;

    let snapshot = {
        let library = state.library().read().await;
        to_document(&SharedListDocument {
            pool: library.pool.clone(),
            watched: library.watched_vec(),
            filters: library.filters.clone(),
        })
    };

    let id = Uuid::new_v4();
    store.merge_doc(DocPath::SharedList(id), snapshot).await?;
    Ok((id, list_share_url(state, id)))
}

/// Import a shared snapshot into the local library, replacing it.
pub async fn import_shared_list(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.sync_store().await.ok_or(ServiceError::Degraded)?;
    let Some(doc) = store.get_doc(DocPath::SharedList(id)).await? else {
        return Err(ServiceError::NotFound(format!("shared list `{id}` not found")));
    };
    let shared: SharedListDocument = from_document(doc)
        .map_err(|err| ServiceError::InvalidState(format!("malformed shared list: {err}")))?;

    {
        let mut library = state.library().write().await;
        library.apply_remote(shared.pool, shared.watched, shared.filters);
        library.persist_synced(state.local());
        events::broadcast_library_changed(state, &library);
    }

    sync_service::schedule_save(state).await;
    events::notify_success(state, "Shared list imported");
    Ok(())
}

/// Canonical link for a shared list snapshot.
pub fn list_share_url(state: &SharedState, id: Uuid) -> String {
    format!("{}?list={id}", state.config().frontend_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{signed_in_state, test_candidate};

    #[tokio::test]
    async fn collections_round_trip_locally_and_remotely() {
        let (state, _guard) = signed_in_state("alice").await;

        let collection = create_collection(
            &state,
            "friday night".into(),
            vec![test_candidate(1, 8.0)],
        )
        .await
        .unwrap();

        assert_eq!(saved_collections(&state).len(), 1);

        // A fresh device restores the mirror.
        state.local().save_json(KEY_COLLECTIONS, &Vec::<SavedCollection>::new());
        restore_collections(&state).await;
        let restored = saved_collections(&state);
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].id, collection.id);

        delete_collection(&state, collection.id).await.unwrap();
        assert!(saved_collections(&state).is_empty());
    }

    #[tokio::test]
    async fn shared_list_round_trips_through_import() {
        let (state, _guard) = signed_in_state("alice").await;
        {
            let mut library = state.library().write().await;
            library.add_front(test_candidate(10, 7.7));
            library.toggle_watched(10);
        }

        let (id, url) = create_shared_list(&state).await.unwrap();
        assert!(url.contains(&format!("list={id}")));

        {
            let mut library = state.library().write().await;
            library.clear_pool();
            library.watched.clear();
        }

        import_shared_list(&state, id).await.unwrap();
        let library = state.library().read().await;
        assert_eq!(library.pool[0].id, 10);
        assert!(library.watched.contains(&10));
    }
}
