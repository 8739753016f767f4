use serde::Deserialize;
use serde_json::Value;

/// High key-range sentinel used to bound `_all_docs` prefix scans.
pub const END_SUFFIX: &str = "\u{ffff}";

/// Subset of the `GET /{db}` metadata the store relies on.
#[derive(Debug, Deserialize)]
pub struct DatabaseInfo {
    /// Opaque sequence token used to anchor a changes-feed subscription.
    pub update_seq: Value,
}

#[derive(Debug, Deserialize)]
/// Response shape of `_all_docs` range queries.
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
/// Single `_all_docs` row; `doc` is present when `include_docs` was requested.
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
/// Response shape of the `_changes` feed.
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
/// Single change notification.
pub struct ChangeRow {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}
