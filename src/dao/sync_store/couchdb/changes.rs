//! Background tasks translating the CouchDB `_changes` feed into the
//! listener contract of [`DocSubscription`] / [`ColSubscription`].
//!
//! Feed errors are reported once through the channel (non-fatal to the
//! subscriber) and the task re-anchors with a fresh snapshot once the server
//! is reachable again.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::warn;

use crate::dao::sync_store::{ColEvent, CollectionQuery, DocEvent, WatchError};

use super::store::CouchSyncStore;

/// Long-poll window requested from `_changes`, in milliseconds.
pub(super) const LONGPOLL_TIMEOUT_MS: &str = "25000";

const INITIAL_RETRY: Duration = Duration::from_secs(1);
const MAX_RETRY: Duration = Duration::from_secs(10);

/// Follow a single document through the changes feed.
pub(super) async fn run_doc_watch(
    store: CouchSyncStore,
    doc_id: String,
    mut seq: Value,
    tx: watch::Sender<DocEvent>,
) {
    let ids = [doc_id.clone()];
    let mut retry = INITIAL_RETRY;

    loop {
        match store.changes(&seq, Some(&ids), true).await {
            Ok(response) => {
                retry = INITIAL_RETRY;
                seq = response.last_seq;
                if let Some(row) = response.results.into_iter().next_back() {
                    let snapshot = if row.deleted {
                        None
                    } else {
                        row.doc.map(super::store::strip_couch_fields)
                    };
                    if tx.send(Ok(snapshot)).is_err() {
                        return;
                    }
                } else if tx.is_closed() {
                    return;
                }
            }
            Err(err) => {
                warn!(doc = %doc_id, error = %err, "changes feed failed; re-anchoring");
                if tx.send(Err(WatchError(err.to_string()))).is_err() {
                    return;
                }
                sleep(retry).await;
                retry = (retry * 2).min(MAX_RETRY);

                // Resync from scratch: anything may have happened while the
                // feed was down.
                match resync_doc(&store, &doc_id).await {
                    Ok((new_seq, snapshot)) => {
                        seq = new_seq;
                        if tx.send(Ok(snapshot)).is_err() {
                            return;
                        }
                    }
                    Err(resync_err) => {
                        warn!(doc = %doc_id, error = %resync_err, "changes resync failed");
                    }
                }
            }
        }
    }
}

/// Follow a collection prefix through the changes feed, re-querying the
/// range whenever one of its documents changes.
pub(super) async fn run_collection_watch(
    store: CouchSyncStore,
    prefix: String,
    query: CollectionQuery,
    mut seq: Value,
    tx: watch::Sender<ColEvent>,
) {
    let mut retry = INITIAL_RETRY;

    loop {
        match store.changes(&seq, None, false).await {
            Ok(response) => {
                retry = INITIAL_RETRY;
                seq = response.last_seq;
                let relevant = response
                    .results
                    .iter()
                    .any(|row| row.id.starts_with(&prefix));
                if relevant {
                    match store.scan_prefix(&prefix, query).await {
                        Ok(rows) => {
                            if tx.send(Ok(rows)).is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            warn!(prefix = %prefix, error = %err, "collection re-query failed");
                            if tx.send(Err(WatchError(err.to_string()))).is_err() {
                                return;
                            }
                        }
                    }
                } else if tx.is_closed() {
                    return;
                }
            }
            Err(err) => {
                warn!(prefix = %prefix, error = %err, "changes feed failed; re-anchoring");
                if tx.send(Err(WatchError(err.to_string()))).is_err() {
                    return;
                }
                sleep(retry).await;
                retry = (retry * 2).min(MAX_RETRY);

                match resync_collection(&store, &prefix, query).await {
                    Ok((new_seq, rows)) => {
                        seq = new_seq;
                        if tx.send(Ok(rows)).is_err() {
                            return;
                        }
                    }
                    Err(resync_err) => {
                        warn!(prefix = %prefix, error = %resync_err, "changes resync failed");
                    }
                }
            }
        }
    }
}

async fn resync_doc(
    store: &CouchSyncStore,
    doc_id: &str,
) -> Result<
    (Value, Option<crate::dao::sync_store::Document>),
    super::error::CouchDaoError,
> {
    let seq = store.update_seq().await?;
    let snapshot = store.get_fields(doc_id).await?;
    Ok((seq, snapshot))
}

async fn resync_collection(
    store: &CouchSyncStore,
    prefix: &str,
    query: CollectionQuery,
) -> Result<
    (Value, Vec<(String, crate::dao::sync_store::Document)>),
    super::error::CouchDaoError,
> {
    let seq = store.update_seq().await?;
    let rows = store.scan_prefix(prefix, query).await?;
    Ok((seq, rows))
}
