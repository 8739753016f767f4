//! The curated pool, watched set, filter predicate and preferences — the
//! client-local data everything else operates on.

use indexmap::IndexSet;
use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::documents::{Candidate, CandidateId, Prefs, WatchFilters};
use crate::dao::local::{KEY_FILTERS, KEY_POOL, KEY_PREFS, KEY_WATCHED, LocalStore};

/// Pool + watched + filters + prefs, as held in memory and persisted locally.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct Library {
    /// Candidate pool, most recently added first.
    pub pool: Vec<Candidate>,
    /// Ids marked watched, in marking order.
    #[schema(value_type = Vec<u64>)]
    pub watched: IndexSet<CandidateId>,
    /// Filter predicate.
    pub filters: WatchFilters,
    /// UI preferences blob.
    pub prefs: Prefs,
}

impl Library {
    /// Load everything from local storage, falling back to defaults.
    pub fn load(local: &LocalStore) -> Self {
        let watched: Vec<CandidateId> = local.load_json(KEY_WATCHED, Vec::new());
        Self {
            pool: local.load_json(KEY_POOL, Vec::new()),
            watched: watched.into_iter().collect(),
            filters: local.load_json(KEY_FILTERS, WatchFilters::default()),
            prefs: local.load_json(KEY_PREFS, Prefs::default()),
        }
    }

    /// Persist the pool/watched/filters triple (the part that syncs).
    pub fn persist_synced(&self, local: &LocalStore) {
        local.save_json(KEY_POOL, &self.pool);
        local.save_json(KEY_WATCHED, &self.watched_vec());
        local.save_json(KEY_FILTERS, &self.filters);
    }

    /// Persist the preferences blob.
    pub fn persist_prefs(&self, local: &LocalStore) {
        local.save_json(KEY_PREFS, &self.prefs);
    }

    /// Watched ids as the array form used on the wire.
    pub fn watched_vec(&self) -> Vec<CandidateId> {
        self.watched.iter().copied().collect()
    }

    /// Whether the pool already holds a candidate with this id.
    pub fn contains(&self, id: CandidateId) -> bool {
        self.pool.iter().any(|candidate| candidate.id == id)
    }

    /// Insert at the front (most-recent-first). Returns `false` without
    /// touching the pool when the id is already present.
    pub fn add_front(&mut self, candidate: Candidate) -> bool {
        if self.contains(candidate.id) {
            return false;
        }
        self.pool.insert(0, candidate);
        true
    }

    /// Remove a candidate by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: CandidateId) -> bool {
        let before = self.pool.len();
        self.pool.retain(|candidate| candidate.id != id);
        self.pool.len() != before
    }

    /// Flip the watched mark for an id, returning the new state.
    pub fn toggle_watched(&mut self, id: CandidateId) -> bool {
        if self.watched.shift_remove(&id) {
            false
        } else {
            self.watched.insert(id);
            true
        }
    }

    /// Drop every pool entry.
    pub fn clear_pool(&mut self) {
        self.pool.clear();
    }

    /// Overwrite the synced triple with a remote snapshot.
    pub fn apply_remote(
        &mut self,
        pool: Vec<Candidate>,
        watched: Vec<CandidateId>,
        filters: WatchFilters,
    ) {
        self.pool = pool;
        self.watched = watched.into_iter().collect();
        self.filters = filters;
    }

    /// Pool entries passing the current filter predicate: rating at or above
    /// the floor, and not watched when watched titles are excluded.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.pool
            .iter()
            .filter(|candidate| {
                let rating_ok = candidate.vote_average >= self.filters.min_rating;
                let watched_ok =
                    !self.filters.exclude_watched || !self.watched.contains(&candidate.id);
                rating_ok && watched_ok
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: CandidateId, rating: f64) -> Candidate {
        Candidate {
            id,
            title: format!("title-{id}"),
            poster_path: None,
            vote_average: rating,
            release_date: String::new(),
            media_type: Default::default(),
        }
    }

    #[test]
    fn candidates_is_a_filtered_subset_of_the_pool() {
        let mut library = Library::default();
        for (id, rating) in [(1, 7.0), (2, 5.0), (3, 9.1), (4, 6.0)] {
            library.add_front(candidate(id, rating));
        }
        library.toggle_watched(3);

        let picked = library.candidates();
        assert!(picked.iter().all(|c| library.contains(c.id)));
        assert!(picked.iter().all(|c| c.vote_average >= 6.0));
        assert!(picked.iter().all(|c| !library.watched.contains(&c.id)));
        let ids: Vec<_> = picked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![4, 1]);
    }

    #[test]
    fn empty_pool_filters_to_nothing() {
        let library = Library::default();
        assert!(library.candidates().is_empty());
    }

    #[test]
    fn rating_floor_and_watched_exclusion_compose() {
        let mut library = Library::default();
        library.add_front(candidate(1, 7.0));
        library.add_front(candidate(2, 5.0));

        let ids: Vec<_> = library.candidates().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1]);

        library.filters.exclude_watched = false;
        library.toggle_watched(1);
        let ids: Vec<_> = library.candidates().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1], "watched titles stay when exclusion is off");
    }

    #[test]
    fn duplicate_add_leaves_pool_unchanged() {
        let mut library = Library::default();
        assert!(library.add_front(candidate(5, 8.0)));
        assert!(!library.add_front(candidate(5, 8.0)));
        assert_eq!(library.pool.len(), 1);
    }

    #[test]
    fn toggle_watched_is_self_inverse() {
        let mut library = Library::default();
        assert!(library.toggle_watched(9));
        assert!(library.watched.contains(&9));
        assert!(!library.toggle_watched(9));
        assert!(!library.watched.contains(&9));
    }
}
