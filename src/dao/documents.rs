//! Typed schemas for the documents exchanged with the sync store.
//!
//! Field names follow the wire format the original web clients wrote
//! (`mediaType`, `clientWriteId`, ...), so a room can be read by any client
//! generation. Catalog-sourced fields keep the catalog's own snake_case
//! (`poster_path`, `vote_average`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::sync_store::Document;

/// Catalog id of a title; opaque to the engine beyond equality.
pub type CandidateId = u64;

/// Kind of title a candidate refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Feature film.
    #[default]
    Movie,
    /// Series / show.
    Tv,
}

/// A pool entry: immutable snapshot of a catalog title taken at add time.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Candidate {
    /// Catalog id, unique within a pool.
    pub id: CandidateId,
    /// Display title.
    pub title: String,
    /// Catalog poster reference.
    #[serde(default)]
    pub poster_path: Option<String>,
    /// Average rating on the catalog's 0-10 scale.
    #[serde(default)]
    pub vote_average: f64,
    /// Release (or first-air) date as reported by the catalog.
    #[serde(default)]
    pub release_date: String,
    /// Movie or show.
    #[serde(rename = "mediaType", default)]
    pub media_type: MediaKind,
}

/// Per-provider availability toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderFilters {
    /// Include titles available on Netflix.
    #[serde(default)]
    pub netflix: bool,
    /// Include titles available on Prime Video.
    #[serde(default)]
    pub prime: bool,
    /// Include titles available on Hotstar.
    #[serde(default)]
    pub hotstar: bool,
}

/// Filter predicate applied when picking and when discovering titles.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WatchFilters {
    /// Drop candidates already marked watched.
    #[serde(rename = "excludeWatched", default = "default_exclude_watched")]
    pub exclude_watched: bool,
    /// Rating floor on the catalog's 0-10 scale.
    #[serde(rename = "minRating", default = "default_min_rating")]
    pub min_rating: f64,
    /// Kind of titles the user is browsing.
    #[serde(rename = "mediaType", default)]
    pub media_kind: MediaKind,
    /// Optional release-year constraint for discovery.
    #[serde(default)]
    pub year: Option<u16>,
    /// Catalog genre ids for discovery.
    #[serde(default)]
    pub genres: Vec<u32>,
    /// Watch region for provider lookups.
    #[serde(default)]
    pub region: Option<String>,
    /// Per-provider toggles.
    #[serde(default)]
    pub ott: ProviderFilters,
    /// Restrict discovery to titles watchable in `region`.
    #[serde(rename = "regionalOnly", default)]
    pub regional_only: bool,
}

fn default_exclude_watched() -> bool {
    true
}

fn default_min_rating() -> f64 {
    6.0
}

impl Default for WatchFilters {
    fn default() -> Self {
        Self {
            exclude_watched: true,
            min_rating: 6.0,
            media_kind: MediaKind::default(),
            year: None,
            genres: Vec::new(),
            region: None,
            ott: ProviderFilters::default(),
            regional_only: false,
        }
    }
}

/// Small UI preferences blob mirrored inside the personal document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Prefs {
    /// Theme name applied by the rendering layer.
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Relative text scale (1.0 = default).
    #[serde(rename = "textScale", default = "default_text_scale")]
    pub text_scale: f32,
    /// Disable animations.
    #[serde(rename = "reduceMotion", default)]
    pub reduce_motion: bool,
}

fn default_theme() -> String {
    "cupcake".into()
}

fn default_text_scale() -> f32 {
    1.0
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            text_scale: 1.0,
            reduce_motion: false,
        }
    }
}

/// Record of the latest group pick, broadcast through the room document.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LastPick {
    /// Unique id of this pick event, used to deduplicate auto-opens.
    #[serde(rename = "pickId")]
    pub pick_id: Uuid,
    /// Chosen candidate.
    #[serde(rename = "movieId")]
    pub candidate_id: CandidateId,
    /// Title cached for banner rendering.
    #[serde(default)]
    pub title: Option<String>,
    /// Movie or show, so other clients open the right details view.
    #[serde(rename = "mediaType", default)]
    pub media_type: MediaKind,
    /// Identity that triggered the pick.
    #[serde(rename = "pickedBy")]
    pub picked_by: String,
    /// Store timestamp of the pick, milliseconds.
    #[serde(rename = "pickedAt", default)]
    pub picked_at: u64,
}

/// Group playback position shared through the room document.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlaybackState {
    /// Candidate being played.
    #[serde(rename = "mediaId")]
    pub media_id: CandidateId,
    /// Movie or show.
    #[serde(rename = "mediaType", default)]
    pub media_type: MediaKind,
    /// Playback position in seconds.
    #[serde(default)]
    pub position: f64,
    /// Whether playback is currently running.
    #[serde(rename = "isPlaying", default)]
    pub is_playing: bool,
    /// Identity that last moved the position.
    #[serde(rename = "updatedBy", default)]
    pub updated_by: Option<String>,
    /// Store timestamp of the last update, milliseconds.
    #[serde(rename = "updatedAt", default)]
    pub updated_at: u64,
}

/// Shared room document: the pool and everything synchronized around it.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoomDocument {
    /// Identity that created the room.
    #[serde(rename = "ownerUid", default)]
    pub owner_uid: Option<String>,
    /// Denormalized pool snapshot.
    #[serde(default)]
    pub pool: Vec<Candidate>,
    /// Watched candidate ids, stored as an array.
    #[serde(default)]
    pub watched: Vec<CandidateId>,
    /// Filter predicate snapshot.
    #[serde(default)]
    pub filters: WatchFilters,
    /// Latest group pick, if any.
    #[serde(rename = "lastPick", default)]
    pub last_pick: Option<LastPick>,
    /// Shared playback position, if any.
    #[serde(default)]
    pub playback: Option<PlaybackState>,
    /// Identity attribution of the last pool/filters write.
    #[serde(rename = "updatedBy", default)]
    pub updated_by: Option<String>,
    /// Monotonic per-client counter of the last pool/filters write.
    #[serde(rename = "clientWriteId", default)]
    pub client_write_id: Option<u64>,
}

/// Personal per-identity document; same pool payload plus settings.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserDocument {
    /// Personal pool.
    #[serde(default)]
    pub pool: Vec<Candidate>,
    /// Watched candidate ids.
    #[serde(default)]
    pub watched: Vec<CandidateId>,
    /// Filter predicate.
    #[serde(default)]
    pub filters: WatchFilters,
    /// Mirrored preferences.
    #[serde(default)]
    pub settings: Option<Prefs>,
    /// Identity attribution of the last write.
    #[serde(rename = "updatedBy", default)]
    pub updated_by: Option<String>,
    /// Monotonic per-client counter of the last write.
    #[serde(rename = "clientWriteId", default)]
    pub client_write_id: Option<u64>,
}

/// Membership record; liveness derives from the store's `updatedAt` stamp.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MemberDocument {
    /// Identity owning the record.
    pub uid: String,
    /// Cached display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// A chat message. Immutable after creation except for `reactions`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageDocument {
    /// Typed payload (text, gif, sticker or voice note).
    #[serde(flatten)]
    pub body: MessageBody,
    /// Members referenced by `@name` tokens, resolved at send time.
    #[serde(default)]
    pub mentions: Vec<Mention>,
    /// Sender identity, `None` for anonymous participants.
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
    /// Sender display name cached at send time.
    #[serde(rename = "userName", default = "default_sender_name")]
    pub user_name: String,
    /// Denormalized snapshot of the message being replied to.
    #[serde(rename = "replyTo", default)]
    pub reply_to: Option<ReplySnapshot>,
    /// Emoji -> reacting identity ids. The only mutable field.
    #[serde(default)]
    pub reactions: IndexMap<String, Vec<String>>,
}

fn default_sender_name() -> String {
    "Anon".into()
}

/// Message payload variants, discriminated by the `type` field on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageBody {
    /// Plain text message.
    Text {
        /// Message text.
        text: String,
    },
    /// Animated GIF attachment.
    Gif {
        /// GIF media URL.
        #[serde(rename = "gifUrl")]
        url: String,
    },
    /// Sticker attachment.
    Sticker {
        /// Sticker media URL.
        #[serde(rename = "stickerUrl")]
        url: String,
    },
    /// Voice note attachment.
    Voice {
        /// Audio media URL.
        #[serde(rename = "voiceUrl")]
        url: String,
        /// Recording length in seconds.
        #[serde(rename = "voiceDuration", default)]
        duration_secs: u32,
    },
}

/// A resolved `@name` mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Mention {
    /// Mentioned identity.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Display name matched against.
    pub name: String,
}

/// Denormalized reply-target snapshot stored on the replying message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReplySnapshot {
    /// Id of the message replied to.
    pub id: String,
    /// Its sender's display name.
    #[serde(rename = "userName")]
    pub user_name: String,
    /// Truncated payload preview.
    #[serde(flatten)]
    pub preview: ReplyPreview,
}

/// Compact preview of a reply target's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplyPreview {
    /// Truncated text excerpt.
    Text {
        /// At most [`crate::services::message_service::REPLY_EXCERPT_CHARS`] characters.
        text: String,
    },
    /// Target was a GIF.
    Gif,
    /// Target was a sticker.
    Sticker,
    /// Target was a voice note.
    Voice {
        /// Recording length in seconds.
        #[serde(rename = "voiceDuration", default)]
        duration_secs: u32,
    },
}

/// Standalone pool snapshot addressed by share links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SharedListDocument {
    /// Shared pool.
    #[serde(default)]
    pub pool: Vec<Candidate>,
    /// Watched ids at share time.
    #[serde(default)]
    pub watched: Vec<CandidateId>,
    /// Filters at share time.
    #[serde(default)]
    pub filters: WatchFilters,
}

/// A saved, named list owned by an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SavedCollection {
    /// Stable collection id.
    pub id: Uuid,
    /// User-chosen name.
    pub name: String,
    /// Entries snapshotted from the pool or search results.
    #[serde(default)]
    pub entries: Vec<Candidate>,
    /// Creation time, milliseconds.
    #[serde(rename = "createdAt", default)]
    pub created_at: u64,
}

/// Per-identity document mirroring every saved collection wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CollectionSetDocument {
    /// All saved collections of the identity.
    #[serde(default)]
    pub collections: Vec<SavedCollection>,
}

/// Serialize a schema into the raw field map the store transports.
pub fn to_document<T: Serialize>(value: &T) -> Document {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => Document::new(),
    }
}

/// Decode a raw field map into a schema, tolerating unknown fields.
pub fn from_document<T: serde::de::DeserializeOwned>(
    doc: Document,
) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::Object(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_body_uses_the_legacy_type_discriminant() {
        let body = MessageBody::Gif {
            url: "https://media.example/party.gif".into(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["type"], json!("gif"));
        assert_eq!(value["gifUrl"], json!("https://media.example/party.gif"));

        let parsed: MessageBody = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, body);
    }

    #[test]
    fn filters_fill_defaults_for_missing_fields() {
        let filters: WatchFilters = serde_json::from_value(json!({})).unwrap();
        assert!(filters.exclude_watched);
        assert_eq!(filters.min_rating, 6.0);
        assert!(filters.genres.is_empty());
    }

    #[test]
    fn room_document_round_trips_through_the_store_format() {
        let room = RoomDocument {
            owner_uid: Some("alice".into()),
            pool: vec![Candidate {
                id: 603,
                title: "The Matrix".into(),
                poster_path: Some("/matrix.jpg".into()),
                vote_average: 8.2,
                release_date: "1999-03-31".into(),
                media_type: MediaKind::Movie,
            }],
            watched: vec![11],
            filters: WatchFilters::default(),
            last_pick: None,
            playback: None,
            updated_by: Some("alice".into()),
            client_write_id: Some(3),
        };

        let doc = to_document(&room);
        assert_eq!(doc["pool"][0]["mediaType"], json!("movie"));
        assert_eq!(doc["clientWriteId"], json!(3));

        let parsed: RoomDocument = from_document(doc).unwrap();
        assert_eq!(parsed, room);
    }
}
