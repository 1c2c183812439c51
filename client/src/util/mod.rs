//! Utility helpers shared across client UI modules.
//!
//! SYSTEM CONTEXT
//! ==============
//! Utility modules isolate formatting and browser/environment concerns from
//! page and component logic to improve reuse and testability.

pub mod auth;
pub mod payload;
pub mod recipient;
pub mod time_ago;
