//! Membership and presence: heartbeat writes plus the listener that derives
//! online/offline from heartbeat recency.
//!
//! Presence is advisory. A member who closes their tab without leaving keeps
//! their record; they flip offline once their last heartbeat ages past the
//! window, and no leave notice fires for that path.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::documents::{MemberDocument, from_document, to_document},
    dao::sync_store::{ColPath, CollectionQuery, DocPath, Document, SyncStore, updated_at_millis},
    services::events,
    state::{SharedState, room::ListenerKind, room::Member},
};

/// Interval between heartbeat writes.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
/// Recency window for counting a member as online; roughly 2.8 heartbeat
/// intervals, tolerating one missed beat.
pub const ONLINE_WINDOW: Duration = Duration::from_secs(70);

/// Classify a heartbeat stamp against the online window.
pub fn is_online(now_ms: u64, last_seen_ms: u64) -> bool {
    last_seen_ms > 0 && now_ms.saturating_sub(last_seen_ms) < ONLINE_WINDOW.as_millis() as u64
}

/// Merge-write this identity's membership record. The store's `updatedAt`
/// stamp doubles as the last-seen signal.
pub async fn heartbeat_once(state: &SharedState, room: Uuid) {
    let Some(identity) = state.session().current() else {
        return;
    };
    let Some(store) = state.sync_store().await else {
        return;
    };

    let patch = to_document(&MemberDocument {
        uid: identity.id.clone(),
        name: Some(identity.display_name.clone()),
    });
    let path = DocPath::Member {
        room,
        user: identity.id,
    };
    if let Err(err) = store.merge_doc(path, patch).await {
        debug!(error = %err, "heartbeat write failed");
    }
}

/// One extra beat outside the fixed cadence; the UI calls this when the page
/// regains visibility to cover tab-backgrounding gaps.
pub async fn heartbeat_now(state: &SharedState) {
    if let Some(room) = state.room().phase().await.room_id() {
        heartbeat_once(state, room).await;
    }
}

/// Start the periodic heartbeat for a room: one beat immediately, then on
/// the fixed interval. Replaces any previous heartbeat task.
pub fn start_heartbeat(state: &SharedState, room: Uuid) {
    let cloned = state.clone();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            ticker.tick().await;
            heartbeat_once(&cloned, room).await;
        }
    });
    state
        .room()
        .listeners()
        .install(ListenerKind::Heartbeat, task);
}

/// Subscribe to the room's membership collection, maintaining the classified
/// member list and emitting join/leave notices.
pub fn start_members_listener(state: &SharedState, room: Uuid) {
    let task = tokio::spawn(run_members_listener(state.clone(), room));
    state.room().listeners().install(ListenerKind::Members, task);
}

async fn run_members_listener(state: SharedState, room: Uuid) {
    let Some(store) = state.sync_store().await else {
        return;
    };
    let mut sub = match store
        .watch_collection(ColPath::Members(room), CollectionQuery::default())
        .await
    {
        Ok(sub) => sub,
        Err(err) => {
            warn!(error = %err, "members listener failed to attach");
            events::notify_error(&state, "Failed to load room members.");
            return;
        }
    };

    // Join/leave notices diff against the previous snapshot, suppressed on
    // the very first one so a fresh subscriber does not see a join burst.
    let mut previous: Option<HashMap<String, String>> = None;

    loop {
        match sub.latest() {
            Ok(rows) => {
                let snapshot = index_names(&rows);
                if let Some(previous) = &previous {
                    emit_membership_notices(&state, previous, &snapshot);
                }
                previous = Some(snapshot);

                let members = classify_members(&rows, now_millis());
                *state.room().members().write().await = members.clone();
                events::broadcast_members_changed(&state, &members);
            }
            Err(err) => {
                warn!(error = %err, "members listener failed");
                events::notify_error(&state, "Failed to load room members.");
            }
        }
        if !sub.changed().await {
            break;
        }
    }
}

fn index_names(rows: &[(String, Document)]) -> HashMap<String, String> {
    rows.iter()
        .map(|(id, doc)| (id.clone(), display_name(id, doc)))
        .collect()
}

fn display_name(id: &str, doc: &Document) -> String {
    from_document::<MemberDocument>(doc.clone())
        .ok()
        .and_then(|member| member.name)
        .unwrap_or_else(|| id.to_string())
}

fn emit_membership_notices(
    state: &SharedState,
    previous: &HashMap<String, String>,
    current: &HashMap<String, String>,
) {
    let self_id = state.session().current_id();

    for (id, name) in current {
        if self_id.as_deref() == Some(id.as_str()) {
            continue;
        }
        if !previous.contains_key(id) {
            events::notify_info(state, format!("{name} joined"));
        }
    }
    for (id, name) in previous {
        if self_id.as_deref() == Some(id.as_str()) {
            continue;
        }
        if !current.contains_key(id) {
            events::notify_info(state, format!("{name} left"));
        }
    }
}

/// Build the sorted, deduplicated member list with online classification.
fn classify_members(rows: &[(String, Document)], now_ms: u64) -> Vec<Member> {
    let mut members: Vec<Member> = rows
        .iter()
        .map(|(id, doc)| {
            let last_seen_ms = updated_at_millis(doc);
            Member {
                id: id.clone(),
                name: display_name(id, doc),
                last_seen_ms,
                online: is_online(now_ms, last_seen_ms),
            }
        })
        .collect();
    members.sort_by(|a, b| b.last_seen_ms.cmp(&a.last_seen_ms));
    members.dedup_by(|a, b| a.id == b.id);
    members
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member_doc(name: &str, last_seen_ms: u64) -> Document {
        json!({"uid": name, "name": name, "updatedAt": last_seen_ms})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn online_window_classifies_by_recency() {
        let now = 1_000_000;
        assert!(is_online(now, now - 69_000));
        assert!(!is_online(now, now - 70_000));
        assert!(!is_online(now, now - 71_000));
        assert!(!is_online(now, 0));
    }

    #[test]
    fn members_sort_most_recent_first_with_classification() {
        let now = 1_000_000;
        let rows = vec![
            ("alice".to_string(), member_doc("alice", now - 5_000)),
            ("bob".to_string(), member_doc("bob", now - 80_000)),
            ("cara".to_string(), member_doc("cara", now - 1_000)),
        ];

        let members = classify_members(&rows, now);
        let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["cara", "alice", "bob"]);
        assert!(members[0].online);
        assert!(members[1].online);
        assert!(!members[2].online, "80s-old heartbeat is offline");
    }

    #[test]
    fn membership_name_falls_back_to_the_record_id() {
        let doc = json!({"uid": "u1"}).as_object().cloned().unwrap();
        assert_eq!(display_name("u1", &doc), "u1");
    }
}
