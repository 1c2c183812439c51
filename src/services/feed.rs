//! Live ordered feed: per-conversation message subscriptions.
//!
//! DESIGN
//! ======
//! A subscription is a long-running `chat:subscribe` request. The subscriber
//! receives the full ordered message list immediately and again after every
//! append, as item frames replying to the original request. Snapshots are
//! whole lists, never deltas, so a dropped snapshot is repaired by the next.
//!
//! Broadcasts use `try_send`: a slow connection never blocks an append.

use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::services::conversation::{ConversationError, ensure_resident};
use crate::services::message::MessageRecord;
use crate::state::{AppState, ConversationState, Subscriber};

/// Build a snapshot item frame replying to `request`.
#[must_use]
pub fn snapshot_frame(request: &Frame, cs: &ConversationState) -> Frame {
    let messages = cs
        .messages
        .iter()
        .map(MessageRecord::from)
        .filter_map(|record| serde_json::to_value(record).ok())
        .collect::<Vec<_>>();

    let mut data = Data::new();
    data.insert("conversation_id".into(), serde_json::json!(cs.conversation.id));
    data.insert("messages".into(), serde_json::Value::Array(messages));
    request
        .item(data)
        .with_conversation_id(cs.conversation.id)
}

/// Register `client_id` for live snapshots of a conversation. Returns the
/// initial snapshot; later snapshots arrive on `tx`. Subscribing again
/// replaces the previous subscription of the same client.
///
/// # Errors
///
/// Returns `NotFound` for an unknown conversation or a database error.
pub async fn subscribe(
    state: &AppState,
    conversation_id: Uuid,
    client_id: Uuid,
    request: &Frame,
    tx: tokio::sync::mpsc::Sender<Frame>,
) -> Result<Frame, ConversationError> {
    if !ensure_resident(state, conversation_id).await? {
        return Err(ConversationError::NotFound(conversation_id));
    }

    let mut conversations = state.conversations.write().await;
    let cs = conversations
        .get_mut(&conversation_id)
        .ok_or(ConversationError::NotFound(conversation_id))?;
    cs.subscribers
        .insert(client_id, Subscriber { tx, request: request.clone() });
    info!(%conversation_id, %client_id, subscribers = cs.subscribers.len(), "feed subscribed");
    Ok(snapshot_frame(request, cs))
}

/// Drop a client's subscription. Returns the original subscribe request so
/// the caller can terminate it with `done`.
pub async fn unsubscribe(state: &AppState, conversation_id: Uuid, client_id: Uuid) -> Option<Frame> {
    let mut conversations = state.conversations.write().await;
    let cs = conversations.get_mut(&conversation_id)?;
    let removed = cs.subscribers.remove(&client_id)?;
    info!(%conversation_id, %client_id, "feed unsubscribed");
    Some(removed.request)
}

/// Drop every subscription held by a disconnected client.
pub async fn unsubscribe_all(state: &AppState, client_id: Uuid) {
    let mut conversations = state.conversations.write().await;
    for cs in conversations.values_mut() {
        cs.subscribers.remove(&client_id);
    }
}

/// Push the current snapshot to every subscriber. Called under the
/// conversation write lock right after a mutation.
pub fn broadcast_snapshot(cs: &ConversationState) {
    for (client_id, subscriber) in &cs.subscribers {
        let frame = snapshot_frame(&subscriber.request, cs);
        if let Err(e) = subscriber.tx.try_send(frame) {
            warn!(conversation_id = %cs.conversation.id, %client_id, error = %e, "feed snapshot dropped");
        }
    }
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
