//! Reusable UI component modules.
//!
//! SYSTEM CONTEXT
//! ==============
//! Components render the conversation screen and its sidebar while
//! reading/writing shared state from Leptos context providers.

pub mod chat_screen;
pub mod message_row;
pub mod sidebar;
