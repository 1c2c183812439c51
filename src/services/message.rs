//! Message service: ordered append with store-assigned timestamps.
//!
//! DESIGN
//! ======
//! The store assigns `timestamp` (from the strictly increasing server clock)
//! and `seq` at append time; the client only supplies the message id, body,
//! and avatar. The id doubles as an idempotency key: appending an id that is
//! already stored returns the stored message without a second write.
//!
//! Appends land in the resident conversation, are marked dirty for the
//! persistence task, and are broadcast to feed subscribers before the lock
//! is released so snapshot order matches append order.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::frame::ErrorCode;
use crate::services::conversation::ensure_resident;
use crate::services::feed;
use crate::state::{AppState, StoredMessage};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("message body is empty")]
    EmptyBody,
    #[error("conversation not found: {0}")]
    ConversationNotFound(Uuid),
    #[error("{0} is not a participant of this conversation")]
    NotParticipant(String),
    #[error("invalid message id: {0}")]
    InvalidId(String),
    #[error("message id {0} belongs to another conversation")]
    IdConflict(Uuid),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for MessageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyBody => "E_EMPTY_MESSAGE",
            Self::ConversationNotFound(_) => "E_CONVERSATION_NOT_FOUND",
            Self::NotParticipant(_) => "E_NOT_PARTICIPANT",
            Self::InvalidId(_) | Self::IdConflict(_) => "E_INVALID_ID",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Wire shape of a message: what snapshots and the loader payload carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub sender: String,
    pub body: String,
    pub avatar_url: Option<String>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl From<&StoredMessage> for MessageRecord {
    fn from(m: &StoredMessage) -> Self {
        Self {
            id: m.id,
            sender: m.sender.clone(),
            body: m.body.clone(),
            avatar_url: m.avatar_url.clone(),
            timestamp: m.timestamp,
        }
    }
}

/// Client-supplied fields of a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub body: String,
    pub avatar_url: Option<String>,
}

/// Result of an append: whether this call stored the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    Created(MessageRecord),
    Existing(MessageRecord),
}

impl Appended {
    #[must_use]
    pub fn record(&self) -> &MessageRecord {
        match self {
            Self::Created(record) | Self::Existing(record) => record,
        }
    }
}

// =============================================================================
// APPEND
// =============================================================================

/// Append a message sent by `sender` (the authenticated handle).
///
/// # Errors
///
/// Returns `EmptyBody` for a blank body, `ConversationNotFound`,
/// `NotParticipant` when the sender is not in the conversation, `IdConflict`
/// when the id is used by another conversation, or a database error.
pub async fn append_message(state: &AppState, sender: &str, new: NewMessage) -> Result<Appended, MessageError> {
    if new.body.trim().is_empty() {
        return Err(MessageError::EmptyBody);
    }
    if !ensure_resident(state, new.conversation_id).await? {
        return Err(MessageError::ConversationNotFound(new.conversation_id));
    }

    let mut conversations = state.conversations.write().await;

    // EDGE: ids are global keys; refuse to reuse one from another conversation.
    if conversations
        .iter()
        .any(|(id, cs)| *id != new.conversation_id && cs.find_message(new.id).is_some())
    {
        return Err(MessageError::IdConflict(new.id));
    }

    let cs = conversations
        .get_mut(&new.conversation_id)
        .ok_or(MessageError::ConversationNotFound(new.conversation_id))?;

    if !cs.conversation.has_participant(sender) {
        return Err(MessageError::NotParticipant(sender.to_owned()));
    }
    if let Some(existing) = cs.find_message(new.id) {
        return Ok(Appended::Existing(MessageRecord::from(existing)));
    }

    let message = StoredMessage {
        id: new.id,
        conversation_id: new.conversation_id,
        sender: sender.to_owned(),
        body: new.body,
        avatar_url: new.avatar_url,
        timestamp: state.clock.now_ms(),
        seq: cs.next_seq,
    };
    cs.next_seq += 1;
    let record = MessageRecord::from(&message);
    cs.dirty.insert(message.id);
    cs.insert_ordered(message);

    info!(conversation_id = %new.conversation_id, message_id = %record.id, %sender, "message appended");
    feed::broadcast_snapshot(cs);
    Ok(Appended::Created(record))
}

/// One-shot ordered read of a conversation's messages.
///
/// # Errors
///
/// Returns `ConversationNotFound` or a database error.
pub async fn list_messages(state: &AppState, conversation_id: Uuid) -> Result<Vec<MessageRecord>, MessageError> {
    if !ensure_resident(state, conversation_id).await? {
        return Err(MessageError::ConversationNotFound(conversation_id));
    }
    let conversations = state.conversations.read().await;
    let cs = conversations
        .get(&conversation_id)
        .ok_or(MessageError::ConversationNotFound(conversation_id))?;
    Ok(cs.messages.iter().map(MessageRecord::from).collect())
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Write appended messages. Ids already stored for the same conversation
/// are skipped, so a retried flush never duplicates rows.
///
/// Returns the ids that Postgres already holds under another conversation.
/// Those rows were not written.
///
/// # Errors
///
/// Returns a database error if the transaction fails.
pub async fn flush_messages(pool: &PgPool, messages: &[StoredMessage]) -> Result<Vec<Uuid>, sqlx::Error> {
    let mut conflicts = Vec::new();
    if messages.is_empty() {
        return Ok(conflicts);
    }

    let mut tx = pool.begin().await?;
    for m in messages {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r"INSERT INTO messages (id, conversation_id, sender, body, avatar_url, ts, seq)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (id) DO NOTHING
              RETURNING id",
        )
        .bind(m.id)
        .bind(m.conversation_id)
        .bind(&m.sender)
        .bind(&m.body)
        .bind(&m.avatar_url)
        .bind(m.timestamp)
        .bind(m.seq)
        .fetch_optional(tx.as_mut())
        .await?;
        if inserted.is_some() {
            continue;
        }

        let owner: Uuid = sqlx::query_scalar("SELECT conversation_id FROM messages WHERE id = $1")
            .bind(m.id)
            .fetch_one(tx.as_mut())
            .await?;
        if owner != m.conversation_id {
            conflicts.push(m.id);
        }
    }
    tx.commit().await?;
    Ok(conflicts)
}

/// Remove messages whose ids turned out to belong to another conversation
/// in storage, and resend the corrected snapshot to subscribers.
pub async fn drop_conflicting(state: &AppState, conversation_id: Uuid, ids: &[Uuid]) {
    if ids.is_empty() {
        return;
    }
    let mut conversations = state.conversations.write().await;
    let Some(cs) = conversations.get_mut(&conversation_id) else {
        return;
    };
    cs.messages.retain(|m| !ids.contains(&m.id));
    for id in ids {
        cs.dirty.remove(id);
        error!(%conversation_id, message_id = %id, "message id already stored for another conversation; dropped");
    }
    feed::broadcast_snapshot(cs);
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
