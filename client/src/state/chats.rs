//! Sidebar conversation list state.

#[cfg(test)]
#[path = "chats_test.rs"]
mod chats_test;

use crate::net::types::ChatMeta;
use crate::util::recipient::resolve_recipient;

#[derive(Clone, Debug, Default)]
pub struct ChatsState {
    pub items: Vec<ChatMeta>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ChatsState {
    /// Replace the list with a fresh server reply, newest first.
    pub fn set_items(&mut self, mut items: Vec<ChatMeta>) {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.items = items;
        self.loading = false;
        self.error = None;
    }

    pub fn set_error(&mut self, message: String) {
        self.loading = false;
        self.error = Some(message);
    }
}

/// Sidebar label for a conversation: the other participant's handle.
pub fn chat_label(chat: &ChatMeta, me: Option<&str>) -> String {
    resolve_recipient(&chat.users, me).unwrap_or_else(|| "Unknown".to_owned())
}
