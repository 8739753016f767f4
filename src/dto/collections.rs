use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::documents::{Candidate, SavedCollection};

/// Create a named saved list.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCollectionRequest {
    /// User-chosen name.
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    /// Entries snapshotted into the collection.
    #[serde(default)]
    pub entries: Vec<Candidate>,
}

/// Every saved collection of the current identity.
#[derive(Debug, Serialize, ToSchema)]
pub struct CollectionsResponse {
    /// Saved collections, newest first.
    pub collections: Vec<SavedCollection>,
}

/// Result of minting a shared pool snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct SharedListResponse {
    /// Id of the standalone snapshot document.
    pub id: Uuid,
    /// Link carrying the id for other participants.
    pub url: String,
}
