//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the live store and its persistence so route handlers
//! can stay focused on protocol translation and auth plumbing.
//!
//! - `conversation`: conversation documents and the Conversation Loader
//! - `message`: ordered append with store-assigned timestamps
//! - `feed`: live ordered subscriptions per conversation
//! - `presence`: profile merge writes and profile watches
//! - `session`: session cookies and websocket tickets
//! - `persistence`: background flush of dirty store state

pub mod conversation;
pub mod feed;
pub mod message;
pub mod persistence;
pub mod presence;
pub mod session;
