//! Room chat: the capped message subscription, sends with mentions and
//! reply snapshots, and the reaction toggle.

use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::documents::{
        Mention, MessageBody, MessageDocument, ReplyPreview, ReplySnapshot, from_document,
        to_document,
    },
    dao::sync_store::{ColPath, CollectionQuery, DocPath, Document, SyncStore, created_at_millis},
    error::ServiceError,
    services::events,
    state::{SharedState, chat::ChatMessage, room::ListenerKind, room::Member},
};

/// Upper bound of the rendered window: the most recent N messages.
pub const MESSAGE_WINDOW: usize = 200;
/// Maximum characters carried into a reply's text excerpt.
pub const REPLY_EXCERPT_CHARS: usize = 40;
/// Longest accepted text message.
const MAX_TEXT_CHARS: usize = 2000;

/// Subscribe to the room's messages, ordered by server timestamp ascending
/// and capped to the most recent [`MESSAGE_WINDOW`]. Replaces any previous
/// messages listener.
pub fn start_messages_listener(state: &SharedState, room: Uuid) {
    let task = tokio::spawn(run_messages_listener(state.clone(), room));
    state
        .room()
        .listeners()
        .install(ListenerKind::Messages, task);
}

async fn run_messages_listener(state: SharedState, room: Uuid) {
    let Some(store) = state.sync_store().await else {
        return;
    };
    let mut sub = match store
        .watch_collection(
            ColPath::Messages(room),
            CollectionQuery::newest(MESSAGE_WINDOW),
        )
        .await
    {
        Ok(sub) => sub,
        Err(err) => {
            warn!(error = %err, "messages listener failed to attach");
            return;
        }
    };

    loop {
        match sub.latest() {
            Ok(rows) => {
                // Delivery order is the render order; no client-side resort.
                let messages = decode_window(rows);
                state.chat().set_messages(messages.clone()).await;
                events::broadcast_messages_changed(&state, &messages);
            }
            Err(err) => {
                warn!(error = %err, "messages listener failed");
            }
        }
        if !sub.changed().await {
            break;
        }
    }
}

fn decode_window(rows: Vec<(String, Document)>) -> Vec<ChatMessage> {
    rows.into_iter()
        .filter_map(|(id, doc)| {
            let created_at_ms = created_at_millis(&doc);
            match from_document::<MessageDocument>(doc) {
                Ok(message) => Some(ChatMessage {
                    id,
                    created_at_ms,
                    doc: message,
                }),
                Err(err) => {
                    warn!(message = %id, error = %err, "skipping malformed message");
                    None
                }
            }
        })
        .collect()
}

/// Send a message to the active room.
///
/// Text sends extract `@name` mentions against the live member list and run
/// the double-submit guard; an identical text within a second of the
/// previous send is silently dropped. Any pending reply draft is snapshotted
/// onto the message and cleared.
pub async fn send_message(state: &SharedState, body: MessageBody) -> Result<(), ServiceError> {
    let Some(room) = state.room().phase().await.room_id() else {
        return Err(ServiceError::InvalidState("not in a room".into()));
    };
    let store = state.sync_store().await.ok_or(ServiceError::Degraded)?;

    let body = validate_body(body)?;
    let mentions = match &body {
        MessageBody::Text { text } => {
            if state.chat().should_drop_duplicate(text) {
                // Double-submit, not an error.
                return Ok(());
            }
            let members = state.room().members().read().await.clone();
            extract_mentions(text, &members)
        }
        _ => Vec::new(),
    };

    let identity = state.session().current();
    let message = MessageDocument {
        body,
        mentions,
        user_id: identity.as_ref().map(|i| i.id.clone()),
        user_name: identity
            .map(|i| i.display_name)
            .unwrap_or_else(|| "Anon".into()),
        reply_to: state.chat().take_reply_draft().map(reply_snapshot),
        reactions: Default::default(),
    };

    store
        .add_doc(ColPath::Messages(room), to_document(&message))
        .await
        .inspect_err(|_| events::notify_error(state, "Failed to send message."))?;
    Ok(())
}

fn validate_body(body: MessageBody) -> Result<MessageBody, ServiceError> {
    match body {
        MessageBody::Text { text } => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(ServiceError::InvalidInput("message text is empty".into()));
            }
            if text.chars().count() > MAX_TEXT_CHARS {
                return Err(ServiceError::InvalidInput("message text is too long".into()));
            }
            Ok(MessageBody::Text { text })
        }
        MessageBody::Gif { url } if url.trim().is_empty() => {
            Err(ServiceError::InvalidInput("gif url is empty".into()))
        }
        MessageBody::Sticker { url } if url.trim().is_empty() => {
            Err(ServiceError::InvalidInput("sticker url is empty".into()))
        }
        MessageBody::Voice { url, .. } if url.trim().is_empty() => {
            Err(ServiceError::InvalidInput("voice url is empty".into()))
        }
        other => Ok(other),
    }
}

/// Resolve `@name` tokens against the member list. A token matches a member
/// by first name or full name; unresolved tokens are dropped.
pub fn extract_mentions(text: &str, members: &[Member]) -> Vec<Mention> {
    let mut mentions: Vec<Mention> = Vec::new();

    for token in text.split_whitespace() {
        let Some(name) = token.strip_prefix('@') else {
            continue;
        };
        let name = name.trim_end_matches(|c: char| c.is_ascii_punctuation());
        if name.is_empty() {
            continue;
        }

        let matched = members.iter().find(|member| {
            let first = member.name.split_whitespace().next().unwrap_or_default();
            first == name || member.name == name
        });

        if let Some(member) = matched
            && !mentions.iter().any(|m| m.user_id == member.id)
        {
            mentions.push(Mention {
                user_id: member.id.clone(),
                name: member.name.clone(),
            });
        }
    }

    mentions
}

/// Build the denormalized snapshot stored on a replying message.
fn reply_snapshot(target: ChatMessage) -> ReplySnapshot {
    let preview = match &target.doc.body {
        MessageBody::Text { text } => ReplyPreview::Text {
            text: truncate_chars(text, REPLY_EXCERPT_CHARS),
        },
        MessageBody::Gif { .. } => ReplyPreview::Gif,
        MessageBody::Sticker { .. } => ReplyPreview::Sticker,
        MessageBody::Voice { duration_secs, .. } => ReplyPreview::Voice {
            duration_secs: *duration_secs,
        },
    };
    ReplySnapshot {
        id: target.id,
        user_name: target.doc.user_name,
        preview,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push('…');
        out
    }
}

/// Point the reply draft at a message in the rendered window.
pub async fn set_reply_draft(state: &SharedState, message_id: &str) -> Result<(), ServiceError> {
    let Some(target) = state.chat().find(message_id).await else {
        return Err(ServiceError::NotFound(format!(
            "message `{message_id}` is not in the current window"
        )));
    };
    state.chat().set_reply_draft(target);
    Ok(())
}

/// Cancel the reply draft.
pub fn clear_reply_draft(state: &SharedState) {
    state.chat().take_reply_draft();
}

/// Toggle the caller's reaction on a message.
///
/// Read-modify-write over the whole reactions map with no transaction:
/// two participants racing on the same message can lose one toggle
/// (last write wins). Accepted for this data; do not rely on reaction
/// counts being exact under concurrency.
pub async fn toggle_reaction(
    state: &SharedState,
    message_id: &str,
    emoji: &str,
) -> Result<(), ServiceError> {
    let Some(room) = state.room().phase().await.room_id() else {
        return Err(ServiceError::InvalidState("not in a room".into()));
    };
    let Some(uid) = state.session().current_id() else {
        events::notify_info(state, "Sign in to react.");
        return Err(ServiceError::Unauthorized("sign in to react".into()));
    };
    let store = state.sync_store().await.ok_or(ServiceError::Degraded)?;

    let path = DocPath::Message {
        room,
        id: message_id.to_string(),
    };
    let Some(doc) = store.get_doc(path.clone()).await? else {
        return Err(ServiceError::NotFound(format!(
            "message `{message_id}` not found"
        )));
    };
    let mut message: MessageDocument = from_document(doc)
        .map_err(|err| ServiceError::InvalidState(format!("malformed message: {err}")))?;

    let users = message.reactions.entry(emoji.to_string()).or_default();
    if let Some(index) = users.iter().position(|existing| existing == &uid) {
        users.remove(index);
    } else {
        users.push(uid);
    }
    if users.is_empty() {
        message.reactions.shift_remove(emoji);
    }

    let mut patch = Document::new();
    patch.insert(
        "reactions".into(),
        serde_json::to_value(&message.reactions).unwrap_or_default(),
    );
    store.merge_doc(path, patch).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::sync_store::SyncStore;
    use crate::services::sync_service;
    use crate::test_support::signed_in_state;
    use indexmap::IndexMap;

    fn member(id: &str, name: &str) -> Member {
        Member {
            id: id.into(),
            name: name.into(),
            last_seen_ms: 0,
            online: true,
        }
    }

    #[test]
    fn mentions_match_first_or_full_name() {
        let members = vec![member("u1", "Alice Johnson"), member("u2", "Bob")];

        let mentions = extract_mentions("hey @Alice and @Bob!", &members);
        let ids: Vec<_> = mentions.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);

        assert!(extract_mentions("no mentions here", &members).is_empty());
        assert!(extract_mentions("@Unknown person", &members).is_empty());
    }

    #[test]
    fn duplicate_mentions_collapse() {
        let members = vec![member("u1", "Alice")];
        let mentions = extract_mentions("@Alice @Alice", &members);
        assert_eq!(mentions.len(), 1);
    }

    #[test]
    fn reply_snapshot_truncates_long_text() {
        let long = "x".repeat(80);
        let target = ChatMessage {
            id: "m1".into(),
            created_at_ms: 0,
            doc: MessageDocument {
                body: MessageBody::Text { text: long },
                mentions: vec![],
                user_id: Some("u1".into()),
                user_name: "Alice".into(),
                reply_to: None,
                reactions: IndexMap::new(),
            },
        };

        let snapshot = reply_snapshot(target);
        match snapshot.preview {
            ReplyPreview::Text { text } => {
                assert_eq!(text.chars().count(), REPLY_EXCERPT_CHARS + 1);
                assert!(text.ends_with('…'));
            }
            other => panic!("expected text preview, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reaction_toggle_is_self_inverse() {
        let (state, _guard) = signed_in_state("alice").await;
        let room = sync_service::create_room(&state).await.unwrap();

        send_message(
            &state,
            MessageBody::Text {
                text: "movie time".into(),
            },
        )
        .await
        .unwrap();

        let store = state.sync_store().await.unwrap();
        let rows = store
            .query(ColPath::Messages(room), CollectionQuery::default())
            .await
            .unwrap();
        let (message_id, _) = rows.first().cloned().unwrap();

        toggle_reaction(&state, &message_id, "🍿").await.unwrap();
        let doc = store
            .get_doc(DocPath::Message {
                room,
                id: message_id.clone(),
            })
            .await
            .unwrap()
            .unwrap();
        let message: MessageDocument = from_document(doc).unwrap();
        assert_eq!(message.reactions["🍿"], vec!["alice".to_string()]);

        toggle_reaction(&state, &message_id, "🍿").await.unwrap();
        let doc = store
            .get_doc(DocPath::Message {
                room,
                id: message_id,
            })
            .await
            .unwrap()
            .unwrap();
        let message: MessageDocument = from_document(doc).unwrap();
        assert!(
            message.reactions.is_empty(),
            "removing the last reactor deletes the emoji key"
        );
    }

    #[tokio::test]
    async fn double_submit_of_identical_text_sends_once() {
        let (state, _guard) = signed_in_state("alice").await;
        let room = sync_service::create_room(&state).await.unwrap();

        for _ in 0..2 {
            send_message(
                &state,
                MessageBody::Text {
                    text: "same text".into(),
                },
            )
            .await
            .unwrap();
        }

        let store = state.sync_store().await.unwrap();
        let rows = store
            .query(ColPath::Messages(room), CollectionQuery::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn reply_draft_is_cleared_on_send() {
        let (state, _guard) = signed_in_state("alice").await;
        let room = sync_service::create_room(&state).await.unwrap();

        send_message(
            &state,
            MessageBody::Text {
                text: "original".into(),
            },
        )
        .await
        .unwrap();

        let store = state.sync_store().await.unwrap();
        let rows = store
            .query(ColPath::Messages(room), CollectionQuery::default())
            .await
            .unwrap();
        let (target_id, target_doc) = rows.first().cloned().unwrap();
        state.chat().set_reply_draft(ChatMessage {
            id: target_id.clone(),
            created_at_ms: created_at_millis(&target_doc),
            doc: from_document(target_doc).unwrap(),
        });

        send_message(
            &state,
            MessageBody::Text {
                text: "the reply".into(),
            },
        )
        .await
        .unwrap();
        assert!(state.chat().reply_draft().is_none());

        let rows = store
            .query(ColPath::Messages(room), CollectionQuery::default())
            .await
            .unwrap();
        let reply = rows
            .iter()
            .map(|(_, doc)| from_document::<MessageDocument>(doc.clone()).unwrap())
            .find(|m| matches!(&m.body, MessageBody::Text { text } if text == "the reply"))
            .unwrap();
        let snapshot = reply.reply_to.expect("reply snapshot attached");
        assert_eq!(snapshot.id, target_id);
        assert!(matches!(
            snapshot.preview,
            ReplyPreview::Text { ref text } if text == "original"
        ));
    }
}
