//! Payload parsing for inbound frames.

#[cfg(test)]
#[path = "frame_client_parse_test.rs"]
mod frame_client_parse_test;

use crate::net::types::{Frame, MessageRecord, UserProfile};

/// Message records of a `chat:subscribe` snapshot item.
///
/// A snapshot that is present but holds an unreadable record is rejected as
/// a whole; applying half a snapshot would drop messages from view.
pub(super) fn parse_snapshot(data: &serde_json::Value) -> Option<Vec<MessageRecord>> {
    let messages = data.get("messages")?.as_array()?;
    messages
        .iter()
        .map(|m| serde_json::from_value::<MessageRecord>(m.clone()).ok())
        .collect()
}

/// Watched handle and profile of a `user:watch` item. A `null` profile
/// means the store has no document for the handle.
pub(super) fn parse_watched_profile(data: &serde_json::Value) -> Option<(String, Option<UserProfile>)> {
    let email = data.get("email")?.as_str()?.to_owned();
    let profile = match data.get("profile") {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => Some(serde_json::from_value::<UserProfile>(value.clone()).ok()?),
    };
    Some((email, profile))
}

/// Conversation targeted by a frame: header first, then payload.
pub(super) fn frame_conversation_id(frame: &Frame) -> Option<&str> {
    frame
        .conversation_id
        .as_deref()
        .or_else(|| frame.data.get("conversation_id").and_then(|v| v.as_str()))
}

pub(super) fn frame_error_message(frame: &Frame) -> String {
    let message = frame
        .data
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error");
    match frame.data.get("code").and_then(|v| v.as_str()) {
        Some(code) => format!("{code}: {message}"),
        None => message.to_owned(),
    }
}
