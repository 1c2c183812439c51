//! Conversation service: conversation documents and the Conversation Loader.
//!
//! DESIGN
//! ======
//! Conversations are made resident in the live store on first access:
//! metadata and the full ordered message history are read from Postgres once,
//! after which every read, subscription, and append is served from memory.
//! A conversation that does not exist is not an error for the loader; it
//! yields an empty participant list and an empty message list so the page
//! can render placeholders.
//!
//! ERROR HANDLING
//! ==============
//! Only storage failures surface as `ConversationError::Database`. Validation
//! errors for conversation creation carry grepable codes for HTTP replies.

use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::frame::ErrorCode;
use crate::services::message::MessageRecord;
use crate::services::session::normalize_email;
use crate::state::{AppState, Conversation, ConversationState, StoredMessage};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("conversation not found: {0}")]
    NotFound(Uuid),
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("cannot start a conversation with yourself")]
    SelfConversation,
    #[error("conversation already exists: {0}")]
    AlreadyExists(Uuid),
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ConversationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_CONVERSATION_NOT_FOUND",
            Self::InvalidRecipient(_) => "E_INVALID_RECIPIENT",
            Self::SelfConversation => "E_SELF_CONVERSATION",
            Self::AlreadyExists(_) => "E_CONVERSATION_EXISTS",
            Self::Encode(_) => "E_ENCODE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Conversation metadata as handed to the view. `created_at` is `None` and
/// `users` empty when the conversation does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMeta {
    pub id: Uuid,
    pub users: Vec<String>,
    pub created_at: Option<i64>,
}

impl ChatMeta {
    #[must_use]
    pub fn missing(id: Uuid) -> Self {
        Self { id, users: Vec::new(), created_at: None }
    }
}

impl From<&Conversation> for ChatMeta {
    fn from(conversation: &Conversation) -> Self {
        Self { id: conversation.id, users: conversation.users.clone(), created_at: Some(conversation.created_at) }
    }
}

/// Loader output: metadata plus the ordered message list serialized as JSON
/// text with epoch-millisecond timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPayload {
    pub chat: ChatMeta,
    pub messages: String,
}

// =============================================================================
// RESIDENCY
// =============================================================================

/// Make a conversation resident, reading it from Postgres if needed.
/// Returns `false` when no such conversation exists.
///
/// # Errors
///
/// Returns a database error if the read fails.
pub async fn ensure_resident(state: &AppState, conversation_id: Uuid) -> Result<bool, sqlx::Error> {
    if state
        .conversations
        .read()
        .await
        .contains_key(&conversation_id)
    {
        return Ok(true);
    }

    let Some(row) = sqlx::query("SELECT id, users, created_at FROM conversations WHERE id = $1")
        .bind(conversation_id)
        .fetch_optional(&state.pool)
        .await?
    else {
        return Ok(false);
    };
    let conversation = Conversation { id: row.get("id"), users: row.get("users"), created_at: row.get("created_at") };

    let rows = sqlx::query(
        r"SELECT id, conversation_id, sender, body, avatar_url, ts, seq
          FROM messages WHERE conversation_id = $1
          ORDER BY ts, seq",
    )
    .bind(conversation_id)
    .fetch_all(&state.pool)
    .await?;
    let messages = rows
        .into_iter()
        .map(|r| StoredMessage {
            id: r.get("id"),
            conversation_id: r.get("conversation_id"),
            sender: r.get("sender"),
            body: r.get("body"),
            avatar_url: r.get("avatar_url"),
            timestamp: r.get("ts"),
            seq: r.get("seq"),
        })
        .collect::<Vec<_>>();

    let mut conversations = state.conversations.write().await;
    // EDGE: a concurrent loader may have won the race; keep its live state.
    if !conversations.contains_key(&conversation_id) {
        let resident = ConversationState::with_messages(conversation, messages);
        if let Some(ts) = resident.latest_timestamp() {
            state.clock.observe(ts);
        }
        info!(%conversation_id, messages = resident.messages.len(), "conversation resident");
        conversations.insert(conversation_id, resident);
    }
    Ok(true)
}

// =============================================================================
// READS
// =============================================================================

/// One-shot read of a conversation document.
///
/// # Errors
///
/// Returns a database error if the conversation must be read and the read fails.
pub async fn get_conversation(state: &AppState, conversation_id: Uuid) -> Result<Option<Conversation>, ConversationError> {
    if !ensure_resident(state, conversation_id).await? {
        return Ok(None);
    }
    let conversations = state.conversations.read().await;
    Ok(conversations
        .get(&conversation_id)
        .map(|cs| cs.conversation.clone()))
}

/// Conversation Loader: metadata plus the ordered message history as of now.
///
/// A missing conversation yields empty metadata and `"[]"`.
///
/// # Errors
///
/// Returns a database error if storage cannot be read.
pub async fn load_conversation(state: &AppState, conversation_id: Uuid) -> Result<ConversationPayload, ConversationError> {
    ensure_resident(state, conversation_id).await?;
    let conversations = state.conversations.read().await;
    build_payload(conversation_id, conversations.get(&conversation_id))
}

/// Build the loader payload from resident state, or the empty payload.
///
/// # Errors
///
/// Returns an encode error if the message list cannot be serialized.
pub fn build_payload(
    conversation_id: Uuid,
    resident: Option<&ConversationState>,
) -> Result<ConversationPayload, ConversationError> {
    let Some(cs) = resident else {
        return Ok(ConversationPayload { chat: ChatMeta::missing(conversation_id), messages: "[]".to_owned() });
    };
    let records = cs
        .messages
        .iter()
        .map(MessageRecord::from)
        .collect::<Vec<_>>();
    Ok(ConversationPayload { chat: ChatMeta::from(&cs.conversation), messages: serde_json::to_string(&records)? })
}

/// Conversations the user participates in, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_conversations(state: &AppState, email: &str) -> Result<Vec<ChatMeta>, ConversationError> {
    let rows = sqlx::query(
        r"SELECT id, users, created_at FROM conversations
          WHERE $1 = ANY(users)
          ORDER BY created_at DESC",
    )
    .bind(email)
    .fetch_all(&state.pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ChatMeta { id: r.get("id"), users: r.get("users"), created_at: Some(r.get("created_at")) })
        .collect())
}

// =============================================================================
// CREATE
// =============================================================================

/// Validate a recipient handle for a conversation started by `me`.
///
/// # Errors
///
/// Returns `InvalidRecipient` for a malformed email and `SelfConversation`
/// when the recipient is the caller.
pub fn validate_recipient(me: &str, recipient: &str) -> Result<String, ConversationError> {
    let normalized = normalize_email(recipient).ok_or_else(|| ConversationError::InvalidRecipient(recipient.to_owned()))?;
    if normalized.eq_ignore_ascii_case(me) {
        return Err(ConversationError::SelfConversation);
    }
    Ok(normalized)
}

/// Create a two-person conversation and make it resident.
///
/// # Errors
///
/// Returns a validation error for a bad recipient, `AlreadyExists` when the
/// pair already has a conversation, or a database error.
pub async fn create_conversation(state: &AppState, me: &str, recipient: &str) -> Result<ChatMeta, ConversationError> {
    let recipient = validate_recipient(me, recipient)?;

    let existing = sqlx::query(
        r"SELECT id FROM conversations
          WHERE users @> ARRAY[$1, $2]::text[] AND cardinality(users) = 2
          LIMIT 1",
    )
    .bind(me)
    .bind(&recipient)
    .fetch_optional(&state.pool)
    .await?;
    if let Some(row) = existing {
        return Err(ConversationError::AlreadyExists(row.get("id")));
    }

    let conversation = Conversation { id: Uuid::new_v4(), users: vec![me.to_owned(), recipient], created_at: state.clock.now_ms() };
    sqlx::query("INSERT INTO conversations (id, users, created_at) VALUES ($1, $2, $3)")
        .bind(conversation.id)
        .bind(&conversation.users)
        .bind(conversation.created_at)
        .execute(&state.pool)
        .await?;

    info!(conversation_id = %conversation.id, users = ?conversation.users, "conversation created");
    let meta = ChatMeta::from(&conversation);
    state
        .conversations
        .write()
        .await
        .insert(conversation.id, ConversationState::new(conversation));
    Ok(meta)
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
