//! In-process [`SyncStore`] backend.
//!
//! Backs offline mode and the test suite: documents live in a process-local
//! map and subscriptions fan out over `tokio::sync::watch` channels, so every
//! engine instance sharing the store observes the same snapshots a hosted
//! backend would deliver.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::watch;

use crate::dao::storage::StorageResult;
use crate::dao::sync_store::{
    ColEvent, ColPath, ColSubscription, CollectionQuery, DocEvent, DocPath, DocSubscription,
    Document, FIELD_CREATED_AT, FIELD_UPDATED_AT, SyncStore, created_at_millis, merge_fields,
};

/// Shared-memory store; cloning yields another handle onto the same documents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    docs: Mutex<BTreeMap<String, Document>>,
    doc_watches: DashMap<String, watch::Sender<DocEvent>>,
    col_watches: Mutex<Vec<ColWatcher>>,
    clock: AtomicU64,
}

struct ColWatcher {
    prefix: String,
    query: CollectionQuery,
    tx: watch::Sender<ColEvent>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    /// Wall clock bumped to stay strictly increasing across rapid writes.
    fn next_stamp(&self) -> u64 {
        super::bump_stamp(&self.clock)
    }

    fn write(&self, key: String, patch: Document) {
        let stamp = self.next_stamp();
        {
            let mut docs = self.docs.lock().expect("memory store poisoned");
            let doc = docs.entry(key.clone()).or_default();
            if !doc.contains_key(FIELD_CREATED_AT) {
                doc.insert(FIELD_CREATED_AT.into(), Value::from(stamp));
            }
            merge_fields(doc, patch);
            doc.insert(FIELD_UPDATED_AT.into(), Value::from(stamp));
        }
        self.notify(&key);
    }

    fn delete(&self, key: &str) {
        let existed = self
            .docs
            .lock()
            .expect("memory store poisoned")
            .remove(key)
            .is_some();
        if existed {
            self.notify(key);
        }
    }

    fn get(&self, key: &str) -> Option<Document> {
        self.docs
            .lock()
            .expect("memory store poisoned")
            .get(key)
            .cloned()
    }

    /// Collection scan: documents under `prefix`, oldest-first, trimmed to the
    /// trailing window the query asks for.
    fn scan(&self, prefix: &str, query: CollectionQuery) -> Vec<(String, Document)> {
        let docs = self.docs.lock().expect("memory store poisoned");
        let mut rows: Vec<(String, Document)> = docs
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, doc)| (key[prefix.len()..].to_string(), doc.clone()))
            .collect();
        rows.sort_by(|a, b| {
            created_at_millis(&a.1)
                .cmp(&created_at_millis(&b.1))
                .then_with(|| a.0.cmp(&b.0))
        });
        if let Some(newest) = query.newest
            && rows.len() > newest
        {
            rows.drain(..rows.len() - newest);
        }
        rows
    }

    /// Push fresh snapshots to every subscription the write touches.
    fn notify(&self, key: &str) {
        if let Some(entry) = self.doc_watches.get(key) {
            let _ = entry.value().send(Ok(self.get(key)));
        }

        let mut watchers = self.col_watches.lock().expect("memory store poisoned");
        watchers.retain(|watcher| watcher.tx.receiver_count() > 0);
        for watcher in watchers.iter() {
            if key.starts_with(&watcher.prefix) {
                let _ = watcher.tx.send(Ok(self.scan(&watcher.prefix, watcher.query)));
            }
        }
    }
}

impl SyncStore for MemoryStore {
    fn get_doc(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.get(&path.canonical())) })
    }

    fn merge_doc(&self, path: DocPath, patch: Document) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write(path.canonical(), patch);
            Ok(())
        })
    }

    fn delete_doc(&self, path: DocPath) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.delete(&path.canonical());
            Ok(())
        })
    }

    fn add_doc(&self, col: ColPath, doc: Document) -> BoxFuture<'static, StorageResult<String>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let id = uuid::Uuid::new_v4().simple().to_string();
            inner.write(format!("{}{id}", col.prefix()), doc);
            Ok(id)
        })
    }

    fn query(
        &self,
        col: ColPath,
        query: CollectionQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<(String, Document)>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.scan(&col.prefix(), query)) })
    }

    fn watch_doc(&self, path: DocPath) -> BoxFuture<'static, StorageResult<DocSubscription>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let key = path.canonical();
            let current = Ok(inner.get(&key));
            let sender = inner
                .doc_watches
                .entry(key)
                .or_insert_with(|| watch::channel(current.clone()).0);
            // Reused channels may hold a stale value from before the last
            // subscriber went away.
            let _ = sender.send(current);
            Ok(DocSubscription::new(sender.subscribe(), None))
        })
    }

    fn watch_collection(
        &self,
        col: ColPath,
        query: CollectionQuery,
    ) -> BoxFuture<'static, StorageResult<ColSubscription>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let prefix = col.prefix();
            let (tx, rx) = watch::channel(Ok(inner.scan(&prefix, query)));
            inner
                .col_watches
                .lock()
                .expect("memory store poisoned")
                .push(ColWatcher { prefix, query, tx });
            Ok(ColSubscription::new(rx, None))
        })
    }

    fn stamp_millis(&self) -> u64 {
        self.inner.next_stamp()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::sync_store::updated_at_millis;
    use serde_json::json;
    use uuid::Uuid;

    fn doc(fields: Value) -> Document {
        fields.as_object().cloned().expect("object literal")
    }

    #[tokio::test]
    async fn merge_creates_and_stamps() {
        let store = MemoryStore::new();
        let path = DocPath::User("alice".into());

        store
            .merge_doc(path.clone(), doc(json!({"pool": []})))
            .await
            .unwrap();
        let first = store.get_doc(path.clone()).await.unwrap().unwrap();
        let created = created_at_millis(&first);
        assert!(created > 0);

        store
            .merge_doc(path.clone(), doc(json!({"pool": [1]})))
            .await
            .unwrap();
        let second = store.get_doc(path).await.unwrap().unwrap();
        assert_eq!(created_at_millis(&second), created);
        assert!(updated_at_millis(&second) > created);
        assert_eq!(second["pool"], json!([1]));
    }

    #[tokio::test]
    async fn doc_watch_sees_initial_and_subsequent_snapshots() {
        let store = MemoryStore::new();
        let path = DocPath::Room(Uuid::new_v4());

        let mut sub = store.watch_doc(path.clone()).await.unwrap();
        assert_eq!(sub.latest(), Ok(None));

        store
            .merge_doc(path, doc(json!({"ownerUid": "alice"})))
            .await
            .unwrap();
        assert!(sub.changed().await);
        let snapshot = sub.latest().unwrap().unwrap();
        assert_eq!(snapshot["ownerUid"], json!("alice"));
    }

    #[tokio::test]
    async fn collection_watch_orders_oldest_first_and_caps_window() {
        let store = MemoryStore::new();
        let col = ColPath::Messages(Uuid::new_v4());

        for n in 0..5 {
            store
                .add_doc(col, doc(json!({"text": format!("m{n}")})))
                .await
                .unwrap();
        }

        let mut sub = store
            .watch_collection(col, CollectionQuery::newest(3))
            .await
            .unwrap();
        let rows = sub.latest().unwrap();
        let texts: Vec<_> = rows.iter().map(|(_, d)| d["text"].clone()).collect();
        assert_eq!(texts, vec![json!("m2"), json!("m3"), json!("m4")]);

        store
            .add_doc(col, doc(json!({"text": "m5"})))
            .await
            .unwrap();
        assert!(sub.changed().await);
        let rows = sub.latest().unwrap();
        assert_eq!(rows.last().unwrap().1["text"], json!("m5"));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn stamps_are_strictly_increasing() {
        let store = MemoryStore::new();
        let a = store.stamp_millis();
        let b = store.stamp_millis();
        assert!(b > a);
    }
}
