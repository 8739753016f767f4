//! Shared fixtures for the unit tests: a state wired to a fresh in-memory
//! store and a throwaway data directory.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::dao::documents::Candidate;
use crate::dao::sync_store::memory::MemoryStore;
use crate::state::{AppState, SharedState, session::Identity};

/// Fresh state over an in-memory store and a temp data dir. Keep the
/// returned guard alive for the test's duration.
pub(crate) async fn test_state() -> (SharedState, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp data dir");
    let config = AppConfig {
        data_dir: dir.path().to_path_buf(),
        frontend_url: "http://localhost:8080".into(),
        catalog: None,
    };
    let state = AppState::new(config);
    state
        .install_sync_store(Arc::new(MemoryStore::new()))
        .await;
    (state, dir)
}

/// [`test_state`] with an identity installed directly (no listener side
/// effects; tests exercising the full sign-in flow call
/// `sync_service::handle_sign_in` themselves).
pub(crate) async fn signed_in_state(uid: &str) -> (SharedState, tempfile::TempDir) {
    let (state, dir) = test_state().await;
    state.session().sign_in(Identity {
        id: uid.to_string(),
        display_name: uid.to_string(),
        avatar_url: None,
    });
    (state, dir)
}

/// Minimal candidate fixture.
pub(crate) fn test_candidate(id: u64, rating: f64) -> Candidate {
    Candidate {
        id,
        title: format!("title-{id}"),
        poster_path: None,
        vote_average: rating,
        release_date: String::new(),
        media_type: Default::default(),
    }
}
