//! Abstraction over the hosted real-time document store.
//!
//! The engine only ever talks to the remote database through [`SyncStore`]:
//! get/merge/delete on single documents, append + query on sub-collections, and
//! listen-for-snapshot subscriptions on both. Backends stamp `createdAt` /
//! `updatedAt` themselves so timestamps reflect the store's clock, not the
//! caller's; stamps are monotonic per store instance (best effort for remote
//! backends, which have no server-time primitive).

#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use std::fmt;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::dao::storage::StorageResult;

/// A raw remote document: a flat map of named fields.
pub type Document = serde_json::Map<String, Value>;

/// Field stamped by the store when a document is first written.
pub const FIELD_CREATED_AT: &str = "createdAt";
/// Field stamped by the store on every write.
pub const FIELD_UPDATED_AT: &str = "updatedAt";

/// Address of a single remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocPath {
    /// Per-identity personal document holding pool/watched/filters/settings.
    User(String),
    /// Shared room document.
    Room(Uuid),
    /// Membership record of one identity inside a room.
    Member {
        /// Room the membership belongs to.
        room: Uuid,
        /// Identity owning the record.
        user: String,
    },
    /// A single chat message inside a room.
    Message {
        /// Room the message belongs to.
        room: Uuid,
        /// Store-assigned message id.
        id: String,
    },
    /// Standalone shared pool snapshot addressed by share links.
    SharedList(Uuid),
    /// Per-identity document mirroring the saved collections wholesale.
    CollectionSet(String),
}

impl DocPath {
    /// Canonical id used as the backend storage key.
    pub fn canonical(&self) -> String {
        match self {
            DocPath::User(uid) => format!("user:{uid}"),
            DocPath::Room(id) => format!("room:{id}"),
            DocPath::Member { room, user } => format!("room:{room}:member:{user}"),
            DocPath::Message { room, id } => format!("room:{room}:message:{id}"),
            DocPath::SharedList(id) => format!("shared-list:{id}"),
            DocPath::CollectionSet(uid) => format!("collection-set:{uid}"),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Address of a queryable sub-collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColPath {
    /// Membership records of a room.
    Members(Uuid),
    /// Chat messages of a room.
    Messages(Uuid),
}

impl ColPath {
    /// Canonical id prefix shared by every document of the collection.
    pub fn prefix(&self) -> String {
        match self {
            ColPath::Members(room) => format!("room:{room}:member:"),
            ColPath::Messages(room) => format!("room:{room}:message:"),
        }
    }

    /// Path of the member document with the given id inside this collection.
    pub fn doc(&self, id: &str) -> DocPath {
        match self {
            ColPath::Members(room) => DocPath::Member {
                room: *room,
                user: id.to_string(),
            },
            ColPath::Messages(room) => DocPath::Message {
                room: *room,
                id: id.to_string(),
            },
        }
    }
}

impl fmt::Display for ColPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

/// Subset of the store's query surface the engine relies on.
///
/// Results are always delivered oldest-first by creation stamp; `newest`
/// trims the head so only the trailing N documents survive (the messages
/// listener caps its window this way).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionQuery {
    /// Keep only the N most recently created documents.
    pub newest: Option<usize>,
}

impl CollectionQuery {
    /// Query keeping only the `n` most recent documents.
    pub fn newest(n: usize) -> Self {
        Self { newest: Some(n) }
    }
}

/// Error delivered through a subscription channel when the backend listener
/// breaks. Non-fatal: backends keep retrying after reporting it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("listener error: {0}")]
pub struct WatchError(pub String);

/// Snapshot payload of a single-document subscription. `None` means the
/// document does not (or no longer does) exist.
pub type DocEvent = Result<Option<Document>, WatchError>;

/// Snapshot payload of a collection subscription: `(doc id, document)` pairs
/// ordered oldest-first.
pub type ColEvent = Result<Vec<(String, Document)>, WatchError>;

/// Aborts the backend listener task when the subscription is dropped.
#[derive(Debug)]
pub(crate) struct ListenerGuard(pub(crate) JoinHandle<()>);

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Live subscription to a single document.
///
/// The initial snapshot is available through [`DocSubscription::latest`]
/// immediately after subscribing; [`DocSubscription::changed`] then waits for
/// the next delivery. Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct DocSubscription {
    rx: watch::Receiver<DocEvent>,
    _guard: Option<ListenerGuard>,
}

impl DocSubscription {
    pub(crate) fn new(rx: watch::Receiver<DocEvent>, guard: Option<ListenerGuard>) -> Self {
        Self { rx, _guard: guard }
    }

    /// Clone out the most recent snapshot, marking it as seen.
    pub fn latest(&mut self) -> DocEvent {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for a snapshot newer than the last [`Self::latest`] call.
    /// Returns `false` once the store side has gone away.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Live subscription to a collection query. Same delivery contract as
/// [`DocSubscription`].
#[derive(Debug)]
pub struct ColSubscription {
    rx: watch::Receiver<ColEvent>,
    _guard: Option<ListenerGuard>,
}

impl ColSubscription {
    pub(crate) fn new(rx: watch::Receiver<ColEvent>, guard: Option<ListenerGuard>) -> Self {
        Self { rx, _guard: guard }
    }

    /// Clone out the most recent snapshot, marking it as seen.
    pub fn latest(&mut self) -> ColEvent {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for a snapshot newer than the last [`Self::latest`] call.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Narrow contract over the hosted real-time document store.
pub trait SyncStore: Send + Sync {
    /// Fetch a single document, `None` when it does not exist.
    fn get_doc(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>>;

    /// Merge the given fields into a document, creating it when absent.
    ///
    /// Top-level fields are replaced wholesale (nested maps are not merged
    /// recursively); the store stamps `updatedAt`, plus `createdAt` on
    /// creation.
    fn merge_doc(&self, path: DocPath, patch: Document) -> BoxFuture<'static, StorageResult<()>>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete_doc(&self, path: DocPath) -> BoxFuture<'static, StorageResult<()>>;

    /// Append a new document to a collection, returning its assigned id.
    /// The store stamps `createdAt`/`updatedAt`.
    fn add_doc(&self, col: ColPath, doc: Document) -> BoxFuture<'static, StorageResult<String>>;

    /// One-shot collection query, oldest-first.
    fn query(
        &self,
        col: ColPath,
        query: CollectionQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<(String, Document)>>>;

    /// Subscribe to snapshots of a single document.
    fn watch_doc(&self, path: DocPath) -> BoxFuture<'static, StorageResult<DocSubscription>>;

    /// Subscribe to snapshots of a collection query.
    fn watch_collection(
        &self,
        col: ColPath,
        query: CollectionQuery,
    ) -> BoxFuture<'static, StorageResult<ColSubscription>>;

    /// The store's notion of "now" in milliseconds, monotonic per instance.
    /// Used for nested timestamps the automatic stamping cannot reach.
    fn stamp_millis(&self) -> u64;

    /// Cheap probe used by the supervisor to detect lost connectivity.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Replace `doc`'s top-level fields with those of `patch`.
pub(crate) fn merge_fields(doc: &mut Document, patch: Document) {
    for (key, value) in patch {
        doc.insert(key, value);
    }
}

/// Advance `clock` to wall time, bumped so consecutive stamps stay strictly
/// increasing even within one millisecond.
pub(crate) fn bump_stamp(clock: &std::sync::atomic::AtomicU64) -> u64 {
    use std::sync::atomic::Ordering;
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    clock
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .map(|last| now.max(last + 1))
        .unwrap_or(now)
}

/// Read a document's creation stamp, `0` when missing or malformed.
pub fn created_at_millis(doc: &Document) -> u64 {
    doc.get(FIELD_CREATED_AT)
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Read a document's update stamp, `0` when missing or malformed.
pub fn updated_at_millis(doc: &Document) -> u64 {
    doc.get(FIELD_UPDATED_AT)
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_paths_nest_under_their_room() {
        let room = Uuid::new_v4();
        let col = ColPath::Members(room);
        let doc = col.doc("alice");
        assert!(doc.canonical().starts_with(&col.prefix()));
        assert_eq!(
            doc,
            DocPath::Member {
                room,
                user: "alice".into()
            }
        );
    }

    #[test]
    fn merge_replaces_top_level_fields_wholesale() {
        let mut doc = Document::new();
        doc.insert("pool".into(), json!([1, 2]));
        doc.insert("filters".into(), json!({"minRating": 6.0}));

        let mut patch = Document::new();
        patch.insert("pool".into(), json!([3]));

        merge_fields(&mut doc, patch);
        assert_eq!(doc["pool"], json!([3]));
        assert_eq!(doc["filters"], json!({"minRating": 6.0}));
    }
}
