//! Outbound frame builders for the chat syscalls.
//!
//! Builders are pure so request shapes can be tested without a socket; the
//! frame client fills in nothing beyond what is built here. The server
//! stamps `from` and `ts` itself.

#[cfg(test)]
#[path = "requests_test.rs"]
mod requests_test;

use crate::net::types::{Frame, FrameStatus};

fn request(syscall: &str, conversation_id: Option<&str>, data: serde_json::Value) -> Frame {
    Frame {
        id: uuid::Uuid::new_v4().to_string(),
        parent_id: None,
        ts: 0,
        conversation_id: conversation_id.map(str::to_owned),
        from: None,
        syscall: syscall.to_owned(),
        status: FrameStatus::Request,
        data,
    }
}

/// Open the live ordered feed of a conversation.
pub fn subscribe_frame(conversation_id: &str) -> Frame {
    request("chat:subscribe", Some(conversation_id), serde_json::json!({}))
}

pub fn unsubscribe_frame(conversation_id: &str) -> Frame {
    request("chat:unsubscribe", Some(conversation_id), serde_json::json!({}))
}

/// Append a message under a client-generated id.
pub fn add_message_frame(conversation_id: &str, message_id: &str, body: &str, avatar_url: Option<&str>) -> Frame {
    request(
        "message:add",
        Some(conversation_id),
        serde_json::json!({
            "conversation_id": conversation_id,
            "id": message_id,
            "body": body,
            "avatar_url": avatar_url,
        }),
    )
}

/// Merge the server's current time into the sender's `last_seen`.
pub fn touch_frame() -> Frame {
    request("user:touch", None, serde_json::json!({}))
}

/// Stream profile changes of `email`.
pub fn watch_frame(email: &str) -> Frame {
    request("user:watch", None, serde_json::json!({ "email": email }))
}

pub fn unwatch_frame(email: &str) -> Frame {
    request("user:unwatch", None, serde_json::json!({ "email": email }))
}
