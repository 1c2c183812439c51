//! Shared wire-protocol DTOs for the client/server boundary.
//!
//! DESIGN
//! ======
//! These types mirror the server's JSON payloads: the REST bodies, the
//! page data embedded in server-rendered HTML, and the `data` of websocket
//! frames. Integer fields that can cross the websocket (timestamps,
//! `last_seen`) arrive as JSON floats after the protobuf hop, so they are
//! read through `frames::i64_from_number`.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

pub use frames::Frame;
pub use frames::Status as FrameStatus;

/// The signed-in user as returned by `/api/auth/me` and embedded in pages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Handle: lowercase email address.
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Conversation metadata. `users` is empty and `created_at` absent when the
/// conversation does not exist.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMeta {
    /// Conversation identifier (UUID string, or the raw route id when it
    /// was not a UUID).
    pub id: String,
    /// Ordered participant handles.
    pub users: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_number")]
    pub created_at: Option<i64>,
}

/// One message as carried by the loader payload and by live snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub sender: String,
    pub body: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Epoch milliseconds assigned by the store. Absent while the write is
    /// still in flight.
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_number")]
    pub timestamp: Option<i64>,
}

/// Profile document of a participant, streamed by `user:watch`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_number")]
    pub last_seen: Option<i64>,
}

/// Conversation Loader output: metadata plus the message list as JSON text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPayload {
    pub chat: ChatMeta,
    pub messages: String,
}

/// Everything a server-rendered page hands to the app before hydration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    pub viewer: Option<User>,
    pub conversation: Option<ConversationPayload>,
}

fn deserialize_opt_i64_from_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => frames::i64_from_number(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected integer, got {value}"))),
    }
}
