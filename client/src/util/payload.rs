//! Decoding of server-rendered payloads.
//!
//! SYSTEM CONTEXT
//! ==============
//! The server embeds `PageData` as a JSON `<script>` block; the hydrating
//! app reads the same block back so both renders start from identical
//! state. The Conversation Loader's message list travels inside it as JSON
//! text and becomes the fallback feed.

#[cfg(test)]
#[path = "payload_test.rs"]
mod payload_test;

use crate::net::types::{MessageRecord, PageData};

/// DOM id of the embedded page-data script.
pub const PAGE_DATA_ELEMENT_ID: &str = "chat-payload";

/// Decode the loader's message text into records ordered by timestamp.
///
/// The sort is stable, so equal timestamps keep payload order. Records
/// without a timestamp sort last. Malformed text yields an empty list.
pub fn decode_fallback(messages: &str) -> Vec<MessageRecord> {
    match serde_json::from_str::<Vec<MessageRecord>>(messages) {
        Ok(mut records) => {
            records.sort_by_key(|r| r.timestamp.unwrap_or(i64::MAX));
            records
        }
        Err(e) => {
            leptos::logging::warn!("malformed conversation payload: {e}");
            Vec::new()
        }
    }
}

/// Serialize page data for a `<script type="application/json">` body.
///
/// `</` is escaped so message text can never close the script element.
pub fn encode_page_data(data: &PageData) -> String {
    serde_json::to_string(data)
        .unwrap_or_else(|_| "{}".to_owned())
        .replace("</", "<\\/")
}

/// Parse the embedded page-data text; anything unreadable means no data.
pub fn decode_page_data(text: &str) -> PageData {
    serde_json::from_str(text).unwrap_or_default()
}

/// Read the page data embedded by the server. Empty outside the browser.
pub fn read_embedded_page_data() -> PageData {
    #[cfg(feature = "hydrate")]
    {
        web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(PAGE_DATA_ELEMENT_ID))
            .and_then(|el| el.text_content())
            .map(|text| decode_page_data(&text))
            .unwrap_or_default()
    }
    #[cfg(not(feature = "hydrate"))]
    {
        PageData::default()
    }
}
