use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::state::session::Identity;

/// Install an externally authenticated identity into the session.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignInRequest {
    /// Provider-assigned identity id; a fresh one is minted when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Display name shown to other participants.
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
    /// Avatar reference, if any.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Current session contents.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Signed-in identity, `None` when signed out.
    pub identity: Option<Identity>,
}
