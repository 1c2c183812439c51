//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool and the live store: resident conversations
//! (metadata, ordered messages, subscribers, dirty set) and user profiles
//! (merged document, watchers, dirty flag). Writes land here first and are
//! flushed to Postgres by the persistence task.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::frame::Frame;

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Conversation document. Participants are lowercase email handles in the
/// order they were recorded at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub users: Vec<String>,
    pub created_at: i64,
}

impl Conversation {
    #[must_use]
    pub fn has_participant(&self, email: &str) -> bool {
        self.users.iter().any(|u| u.eq_ignore_ascii_case(email))
    }
}

/// One stored message. Mirrors the `messages` table; immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: String,
    pub body: String,
    pub avatar_url: Option<String>,
    /// Store-assigned epoch milliseconds.
    pub timestamp: i64,
    /// Arrival order at the store; breaks timestamp ties.
    pub seq: i64,
}

impl StoredMessage {
    #[must_use]
    pub fn order_key(&self) -> (i64, i64) {
        (self.timestamp, self.seq)
    }
}

/// User profile document. Updated with merge semantics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub last_seen: Option<i64>,
}

impl UserProfile {
    /// Merge `patch` into `self`: present fields overwrite, absent fields keep
    /// their value, `last_seen` never moves backwards.
    pub fn merge(&mut self, patch: &ProfilePatch) {
        if let Some(name) = &patch.name {
            self.name = Some(name.clone());
        }
        if let Some(avatar_url) = &patch.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
        if let Some(last_seen) = patch.last_seen {
            self.last_seen = Some(self.last_seen.map_or(last_seen, |prev| prev.max(last_seen)));
        }
    }
}

/// Partial profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub last_seen: Option<i64>,
}

// =============================================================================
// LIVE STATE
// =============================================================================

/// A connection's long-running request. Item frames pushed to `tx` reply to
/// `request`, so the client can correlate them via `parent_id`.
#[derive(Clone)]
pub struct Subscriber {
    pub tx: mpsc::Sender<Frame>,
    pub request: Frame,
}

/// Per-conversation live state. Kept in memory while resident.
pub struct ConversationState {
    pub conversation: Conversation,
    /// Messages ordered by `(timestamp, seq)`.
    pub messages: Vec<StoredMessage>,
    /// Live feed subscribers: `client_id` -> subscription.
    pub subscribers: HashMap<Uuid, Subscriber>,
    /// Message IDs appended since last flush.
    pub dirty: HashSet<Uuid>,
    pub next_seq: i64,
}

impl ConversationState {
    #[must_use]
    pub fn new(conversation: Conversation) -> Self {
        Self::with_messages(conversation, Vec::new())
    }

    /// Build state from already stored messages, in any order.
    #[must_use]
    pub fn with_messages(conversation: Conversation, mut messages: Vec<StoredMessage>) -> Self {
        messages.sort_by_key(StoredMessage::order_key);
        let next_seq = messages.iter().map(|m| m.seq).max().map_or(1, |max| max + 1);
        Self { conversation, messages, subscribers: HashMap::new(), dirty: HashSet::new(), next_seq }
    }

    #[must_use]
    pub fn find_message(&self, id: Uuid) -> Option<&StoredMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Insert keeping `(timestamp, seq)` order.
    pub fn insert_ordered(&mut self, message: StoredMessage) {
        let key = message.order_key();
        let at = self.messages.partition_point(|m| m.order_key() <= key);
        self.messages.insert(at, message);
    }

    #[must_use]
    pub fn latest_timestamp(&self) -> Option<i64> {
        self.messages.last().map(|m| m.timestamp)
    }
}

/// Per-email profile entry. `loaded` is false until the durable copy has
/// been read, so a watch never reports "missing" for a profile that exists.
#[derive(Default)]
pub struct ProfileEntry {
    pub profile: Option<UserProfile>,
    pub loaded: bool,
    /// Profile watchers: `client_id` -> watch request.
    pub watchers: HashMap<Uuid, Subscriber>,
    pub dirty: bool,
    /// Bumped on every local change; a flush only clears `dirty` when the
    /// version it wrote is still current.
    pub version: u64,
}

// =============================================================================
// SERVER CLOCK
// =============================================================================

/// Strictly increasing epoch-millisecond clock for store-assigned timestamps.
#[derive(Clone, Default)]
pub struct ServerClock {
    last: Arc<AtomicI64>,
}

impl ServerClock {
    /// Current wall time, bumped past the last value handed out.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        let wall = crate::frame::now_ms();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(wall.max(prev + 1)))
            .unwrap_or(wall);
        wall.max(prev + 1)
    }

    /// Record a timestamp read from storage so later values sort after it.
    pub fn observe(&self, ts: i64) {
        self.last.fetch_max(ts, Ordering::SeqCst);
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ServerConfig>,
    pub conversations: Arc<RwLock<HashMap<Uuid, ConversationState>>>,
    pub profiles: Arc<RwLock<HashMap<String, ProfileEntry>>>,
    pub clock: ServerClock,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: ServerConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            conversations: Arc::new(RwLock::new(HashMap::new())),
            profiles: Arc::new(RwLock::new(HashMap::new())),
            clock: ServerClock::default(),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
