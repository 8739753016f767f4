use serde::Serialize;
use utoipa::ToSchema;

use crate::state::library::Library;

/// Snapshot of the pool/watched/filters/prefs aggregate.
#[derive(Debug, Serialize, ToSchema)]
pub struct LibraryResponse {
    /// Current library contents.
    #[serde(flatten)]
    pub library: Library,
}

impl From<Library> for LibraryResponse {
    fn from(library: Library) -> Self {
        Self { library }
    }
}
