//! View state of the conversation screen.
//!
//! DESIGN
//! ======
//! The screen starts from the server-rendered fallback feed and switches to
//! live data the first time a `chat:subscribe` snapshot arrives. The switch
//! is a one-way latch (`Feed::Static` → `Feed::Live`): an empty live
//! snapshot still wins, and nothing ever returns to the fallback.
//!
//! Sending is two independent writes: a `user:touch` presence merge and a
//! `message:add` append keyed by a client-generated id. Until the live feed
//! carries that id, the message shows as an optimistic outbox row; a failed
//! append marks the row instead of removing it.
//!
//! All transitions here are plain data updates so they can be tested
//! without a browser; the frame client and components only route frames
//! and signals into these methods.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use std::collections::HashMap;

use crate::net::requests;
use crate::net::types::{ChatMeta, ConversationPayload, Frame, FrameStatus, MessageRecord, User, UserProfile};
use crate::util::payload::decode_fallback;
use crate::util::recipient::resolve_recipient;
use crate::util::time_ago::time_ago;

/// Delivery state of a rendered message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Stored with a server timestamp.
    Stored,
    /// Written but not yet timestamped by the store.
    Pending,
    /// The append was rejected.
    Failed,
}

/// One rendered message row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRow {
    pub id: String,
    pub sender: String,
    pub body: String,
    pub avatar_url: Option<String>,
    pub timestamp: Option<i64>,
    pub delivery: Delivery,
}

impl From<MessageRecord> for MessageRow {
    fn from(record: MessageRecord) -> Self {
        let delivery = if record.timestamp.is_some() { Delivery::Stored } else { Delivery::Pending };
        Self {
            id: record.id,
            sender: record.sender,
            body: record.body,
            avatar_url: record.avatar_url,
            timestamp: record.timestamp,
            delivery,
        }
    }
}

/// Source of the rendered message list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Feed {
    /// Server-rendered rows, shown until the first live snapshot.
    Static(Vec<MessageRow>),
    /// Rows of the most recent live snapshot.
    Live(Vec<MessageRow>),
}

impl Default for Feed {
    fn default() -> Self {
        Self::Static(Vec::new())
    }
}

impl Feed {
    pub fn rows(&self) -> &[MessageRow] {
        match self {
            Self::Static(rows) | Self::Live(rows) => rows,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Install a live snapshot. Returns `false` when it equals the current
    /// live rows.
    fn replace_live(&mut self, rows: Vec<MessageRow>) -> bool {
        if let Self::Live(current) = self {
            if *current == rows {
                return false;
            }
        }
        *self = Self::Live(rows);
        true
    }
}

/// Profile lookup of the recipient.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ProfileState {
    /// No answer from the store yet.
    #[default]
    Pending,
    /// The store has no profile document for the handle.
    Missing,
    Present(UserProfile),
}

/// The two writes produced by one submit, dispatched independently.
#[derive(Clone, Debug)]
pub struct SendPlan {
    pub message_id: String,
    pub touch: Frame,
    pub add: Frame,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum InFlight {
    Touch,
    Add(String),
}

#[derive(Clone, Debug, Default)]
pub struct ChatState {
    pub chat: ChatMeta,
    /// Handle of the other participant; `None` for an empty conversation.
    pub recipient: Option<String>,
    pub feed: Feed,
    /// Optimistic rows for sends the live feed does not contain yet.
    pub outbox: Vec<MessageRow>,
    pub input: String,
    pub profile: ProfileState,
    /// Incremented on every submit; the screen scrolls when it changes.
    pub scroll_requests: u64,
    /// Request id of the open `chat:subscribe`.
    pub subscription_id: Option<String>,
    /// Request id of the open `user:watch`.
    pub watch_id: Option<String>,
    in_flight: HashMap<String, InFlight>,
}

impl ChatState {
    /// Screen state for a loader payload, viewed by `me`.
    pub fn open(payload: &ConversationPayload, me: Option<&str>) -> Self {
        let rows = decode_fallback(&payload.messages)
            .into_iter()
            .map(MessageRow::from)
            .collect();
        Self {
            chat: payload.chat.clone(),
            recipient: resolve_recipient(&payload.chat.users, me),
            feed: Feed::Static(rows),
            ..Self::default()
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.chat.id
    }

    /// Re-resolve the recipient after the signed-in user changed. Returns
    /// `true` when the recipient is different, resetting the profile lookup.
    pub fn set_viewer(&mut self, me: Option<&str>) -> bool {
        let recipient = resolve_recipient(&self.chat.users, me);
        if recipient == self.recipient {
            return false;
        }
        self.recipient = recipient;
        self.profile = ProfileState::Pending;
        true
    }

    /// Rows to render: the feed followed by outbox rows it does not contain.
    pub fn rows(&self) -> Vec<MessageRow> {
        let feed = self.feed.rows();
        let mut rows = feed.to_vec();
        rows.extend(
            self.outbox
                .iter()
                .filter(|pending| !feed.iter().any(|row| row.id == pending.id))
                .cloned(),
        );
        rows
    }

    /// Apply a live snapshot. Returns `false` when nothing changed.
    pub fn apply_live_snapshot(&mut self, records: Vec<MessageRecord>) -> bool {
        let rows: Vec<MessageRow> = records.into_iter().map(MessageRow::from).collect();
        let before = self.outbox.len();
        self.outbox
            .retain(|pending| !rows.iter().any(|row| row.id == pending.id));
        let outbox_changed = self.outbox.len() != before;
        self.feed.replace_live(rows) || outbox_changed
    }

    /// Turn the current input into a send plan. Blank input is ignored;
    /// anything else is sent exactly as typed.
    ///
    /// The input is cleared and an optimistic pending row is queued at once;
    /// neither write waits for the other.
    pub fn submit(&mut self, me: &User) -> Option<SendPlan> {
        if self.input.trim().is_empty() {
            return None;
        }
        let body = std::mem::take(&mut self.input);

        let message_id = uuid::Uuid::new_v4().to_string();
        let touch = requests::touch_frame();
        let add = requests::add_message_frame(&self.chat.id, &message_id, &body, me.avatar_url.as_deref());

        self.in_flight.insert(touch.id.clone(), InFlight::Touch);
        self.in_flight
            .insert(add.id.clone(), InFlight::Add(message_id.clone()));
        self.outbox.push(MessageRow {
            id: message_id.clone(),
            sender: me.email.clone(),
            body,
            avatar_url: me.avatar_url.clone(),
            timestamp: None,
            delivery: Delivery::Pending,
        });
        self.scroll_requests += 1;

        Some(SendPlan { message_id, touch, add })
    }

    /// Mark both writes of a plan as failed to dispatch (no connection).
    pub fn dispatch_failed(&mut self, plan: &SendPlan) {
        self.in_flight.remove(&plan.touch.id);
        self.in_flight.remove(&plan.add.id);
        self.mark_failed(&plan.message_id);
    }

    /// Route a terminal reply to one of our writes. Returns `false` for
    /// frames that answer something else.
    pub fn apply_write_reply(&mut self, frame: &Frame) -> bool {
        let Some(parent_id) = frame.parent_id.as_deref() else {
            return false;
        };
        if !matches!(frame.status, FrameStatus::Done | FrameStatus::Error) {
            return false;
        }
        let Some(kind) = self.in_flight.remove(parent_id) else {
            return false;
        };

        match (kind, frame.status) {
            (InFlight::Add(message_id), FrameStatus::Done) => {
                let stored = frame
                    .data
                    .get("message")
                    .and_then(|m| serde_json::from_value::<MessageRecord>(m.clone()).ok());
                if let (Some(stored), Some(row)) = (stored, self.outbox.iter_mut().find(|r| r.id == message_id)) {
                    row.timestamp = stored.timestamp;
                    row.delivery = if stored.timestamp.is_some() { Delivery::Stored } else { Delivery::Pending };
                }
            }
            (InFlight::Add(message_id), _) => {
                leptos::logging::warn!("message {message_id} not delivered: {}", frame.data);
                self.mark_failed(&message_id);
            }
            (InFlight::Touch, FrameStatus::Error) => {
                leptos::logging::warn!("presence update failed: {}", frame.data);
            }
            (InFlight::Touch, _) => {}
        }
        true
    }

    /// Record the recipient's profile from a `user:watch` item.
    pub fn apply_profile(&mut self, email: &str, profile: Option<UserProfile>) -> bool {
        let Some(recipient) = self.recipient.as_deref() else {
            return false;
        };
        if !recipient.eq_ignore_ascii_case(email) {
            return false;
        }
        self.profile = profile.map_or(ProfileState::Missing, ProfileState::Present);
        true
    }

    /// Header title: profile name, else the handle, else "Unknown".
    pub fn display_name(&self) -> String {
        if let ProfileState::Present(profile) = &self.profile {
            if let Some(name) = profile.name.as_deref().filter(|n| !n.is_empty()) {
                return name.to_owned();
            }
        }
        self.recipient
            .clone()
            .unwrap_or_else(|| "Unknown".to_owned())
    }

    pub fn avatar_url(&self) -> Option<String> {
        match &self.profile {
            ProfileState::Present(profile) => profile.avatar_url.clone(),
            _ => None,
        }
    }

    fn mark_failed(&mut self, message_id: &str) {
        if let Some(row) = self.outbox.iter_mut().find(|r| r.id == message_id) {
            row.delivery = Delivery::Failed;
        }
    }
}

/// Header presence line for the recipient.
pub fn presence_label(profile: &ProfileState, now_ms: i64) -> String {
    match profile {
        ProfileState::Pending | ProfileState::Missing => "Loading Last active...".to_owned(),
        ProfileState::Present(UserProfile { last_seen: None, .. }) => "Last active: Unavailable".to_owned(),
        ProfileState::Present(UserProfile { last_seen: Some(ts), .. }) => {
            format!("Last active: {}", time_ago(*ts, now_ms))
        }
    }
}
