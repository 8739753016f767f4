use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value, json};
use tokio::sync::watch;

use crate::dao::storage::StorageResult;
use crate::dao::sync_store::{
    ColPath, ColSubscription, CollectionQuery, DocPath, DocSubscription, Document,
    FIELD_CREATED_AT, FIELD_UPDATED_AT, ListenerGuard, SyncStore, bump_stamp, created_at_millis,
    merge_fields,
};

use super::{
    changes,
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{AllDocsResponse, ChangesResponse, DatabaseInfo, END_SUFFIX},
};

const MERGE_ATTEMPTS: usize = 3;

/// [`SyncStore`] backend persisting documents in CouchDB, with listener
/// subscriptions driven by the `_changes` feed.
#[derive(Clone)]
pub struct CouchSyncStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    clock: Arc<AtomicU64>,
}

impl CouchSyncStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            clock: Arc::new(AtomicU64::new(0)),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn database_request(&self, method: Method) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, self.database);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let response = self
            .database_request(Method::GET)
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .database_request(Method::PUT)
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    /// Sequence token to anchor a changes-feed subscription at "now".
    pub(super) async fn update_seq(&self) -> CouchResult<Value> {
        let database = self.database.to_string();
        let response = self
            .database_request(Method::GET)
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(CouchDaoError::DatabaseStatus {
                database,
                status: response.status(),
            });
        }
        let info: DatabaseInfo =
            response
                .json()
                .await
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: database,
                    source,
                })?;
        Ok(info.update_seq)
    }

    /// Fetch the raw CouchDB document (including `_rev`), `None` on 404.
    async fn get_raw(&self, doc_id: &str) -> CouchResult<Option<Value>> {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response
                    .json::<Value>()
                    .await
                    .map(Some)
                    .map_err(|source| CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Application view of a document, with CouchDB bookkeeping stripped.
    pub(super) async fn get_fields(&self, doc_id: &str) -> CouchResult<Option<Document>> {
        Ok(self.get_raw(doc_id).await?.map(strip_couch_fields))
    }

    /// Merge `patch` into the stored document, retrying the revision race a
    /// bounded number of times.
    async fn merge(&self, doc_id: &str, patch: Document) -> CouchResult<()> {
        for _ in 0..MERGE_ATTEMPTS {
            let existing = self.get_raw(doc_id).await?;
            let rev = existing
                .as_ref()
                .and_then(|value| value.get("_rev"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let mut fields = existing.map(strip_couch_fields).unwrap_or_default();
            let stamp = bump_stamp(&self.clock);
            if !fields.contains_key(FIELD_CREATED_AT) {
                fields.insert(FIELD_CREATED_AT.into(), Value::from(stamp));
            }
            merge_fields(&mut fields, patch.clone());
            fields.insert(FIELD_UPDATED_AT.into(), Value::from(stamp));

            let mut body = Map::new();
            body.insert("_id".into(), Value::from(doc_id));
            if let Some(rev) = rev {
                body.insert("_rev".into(), Value::from(rev));
            }
            body.extend(fields);

            let response = self
                .request(Method::PUT, doc_id)
                .json(&Value::Object(body))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: doc_id.to_string(),
                    source,
                })?;

            match response.status() {
                StatusCode::CONFLICT => continue,
                status if status.is_success() => return Ok(()),
                other => {
                    return Err(CouchDaoError::RequestStatus {
                        path: doc_id.to_string(),
                        status: other,
                    });
                }
            }
        }

        Err(CouchDaoError::RevisionContention {
            path: doc_id.to_string(),
        })
    }

    async fn delete(&self, doc_id: &str) -> CouchResult<()> {
        let Some(raw) = self.get_raw(doc_id).await? else {
            return Ok(());
        };
        let Some(rev) = raw.get("_rev").and_then(Value::as_str) else {
            return Ok(());
        };

        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            // A concurrent rewrite between GET and DELETE surfaces as a
            // conflict; the next sweep retries naturally.
            StatusCode::CONFLICT => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Range-scan every document whose id starts with `prefix`.
    pub(super) async fn scan_prefix(
        &self,
        prefix: &str,
        query: CollectionQuery,
    ) -> CouchResult<Vec<(String, Document)>> {
        let start = serde_json::to_string(prefix).unwrap_or_default();
        let end = serde_json::to_string(&format!("{prefix}{END_SUFFIX}")).unwrap_or_default();

        let response = self
            .request(Method::GET, "_all_docs")
            .query(&[
                ("include_docs", "true"),
                ("startkey", start.as_str()),
                ("endkey", end.as_str()),
            ])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: "_all_docs".into(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: "_all_docs".into(),
                status: response.status(),
            });
        }

        let parsed: AllDocsResponse =
            response
                .json()
                .await
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: "_all_docs".into(),
                    source,
                })?;

        let mut rows: Vec<(String, Document)> = parsed
            .rows
            .into_iter()
            .filter_map(|row| {
                let doc = row.doc.map(strip_couch_fields)?;
                Some((row.id[prefix.len()..].to_string(), doc))
            })
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
        Ok(rows)
    }

    /// One long-poll round against the `_changes` feed. `doc_ids` narrows the
    /// feed to specific documents; without it every change in the database is
    /// reported (callers filter by prefix).
    pub(super) async fn changes(
        &self,
        since: &Value,
        doc_ids: Option<&[String]>,
        include_docs: bool,
    ) -> CouchResult<ChangesResponse> {
        let since_param = match since {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut builder = self
            .request(Method::POST, "_changes")
            .query(&[
                ("feed", "longpoll"),
                ("timeout", changes::LONGPOLL_TIMEOUT_MS),
                ("since", since_param.as_str()),
                ("include_docs", if include_docs { "true" } else { "false" }),
            ])
            .json(&json!({}));

        if let Some(ids) = doc_ids {
            builder = builder
                .query(&[("filter", "_doc_ids")])
                .json(&json!({ "doc_ids": ids }));
        }

        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: "_changes".into(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: "_changes".into(),
                status: response.status(),
            });
        }

        response
            .json()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: "_changes".into(),
                source,
            })
    }
}

impl SyncStore for CouchSyncStore {
    fn get_doc(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.get_fields(&path.canonical()).await?) })
    }

    fn merge_doc(&self, path: DocPath, patch: Document) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.merge(&path.canonical(), patch).await?) })
    }

    fn delete_doc(&self, path: DocPath) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.delete(&path.canonical()).await?) })
    }

    fn add_doc(&self, col: ColPath, doc: Document) -> BoxFuture<'static, StorageResult<String>> {
        let store = self.clone();
        Box::pin(async move {
            let id = uuid::Uuid::new_v4().simple().to_string();
            store.merge(&format!("{}{id}", col.prefix()), doc).await?;
            Ok(id)
        })
    }

    fn query(
        &self,
        col: ColPath,
        query: CollectionQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<(String, Document)>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.scan_prefix(&col.prefix(), query).await?) })
    }

    fn watch_doc(&self, path: DocPath) -> BoxFuture<'static, StorageResult<DocSubscription>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = path.canonical();
            let seq = store.update_seq().await?;
            let initial = store.get_fields(&doc_id).await?;
            let (tx, rx) = watch::channel(Ok(initial));
            let guard = ListenerGuard(tokio::spawn(changes::run_doc_watch(
                store, doc_id, seq, tx,
            )));
            Ok(DocSubscription::new(rx, Some(guard)))
        })
    }

    fn watch_collection(
        &self,
        col: ColPath,
        query: CollectionQuery,
    ) -> BoxFuture<'static, StorageResult<ColSubscription>> {
        let store = self.clone();
        Box::pin(async move {
            let prefix = col.prefix();
            let seq = store.update_seq().await?;
            let initial = store.scan_prefix(&prefix, query).await?;
            let (tx, rx) = watch::channel(Ok(initial));
            let guard = ListenerGuard(tokio::spawn(changes::run_collection_watch(
                store, prefix, query, seq, tx,
            )));
            Ok(ColSubscription::new(rx, Some(guard)))
        })
    }

    fn stamp_millis(&self) -> u64 {
        bump_stamp(&self.clock)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.update_seq().await?;
            Ok(())
        })
    }
}

/// Drop CouchDB bookkeeping (`_id`, `_rev`, ...) from a fetched document.
pub(super) fn strip_couch_fields(value: Value) -> Document {
    match value {
        Value::Object(map) => map
            .into_iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .collect(),
        _ => Document::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strip_couch_fields_drops_bookkeeping() {
        let value = json!({"_id": "user:a", "_rev": "1-abc", "pool": []});
        let doc = strip_couch_fields(value);
        assert!(!doc.contains_key("_id"));
        assert!(!doc.contains_key("_rev"));
        assert!(doc.contains_key("pool"));
    }
}
