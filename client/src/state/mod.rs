//! Reactive application state, provided to components as `RwSignal`
//! contexts by the root `App`.

pub mod auth;
pub mod chat;
pub mod chats;
pub mod connection;
