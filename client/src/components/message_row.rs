//! Single message bubble.

use leptos::prelude::*;

use time::UtcOffset;

use crate::state::chat::{Delivery, MessageRow};
use crate::util::time_ago::{clock_time, local_offset};

/// Footer text under a bubble: store time, pending marker, or failure.
pub fn delivery_label(row: &MessageRow, offset: UtcOffset) -> String {
    match (row.delivery, row.timestamp) {
        (Delivery::Failed, _) => "Not delivered".to_owned(),
        (_, Some(ts)) => clock_time(ts, offset),
        (_, None) => "pending".to_owned(),
    }
}

/// A message bubble, aligned right for the viewer's own messages.
#[component]
pub fn MessageItem(row: MessageRow, own: bool) -> impl IntoView {
    let class = if own { "message message--sent" } else { "message message--received" };
    let footer_class = if row.delivery == Delivery::Failed { "message__meta message__meta--failed" } else { "message__meta" };

    // SSR renders UTC; effects only run in the browser, after hydration.
    let offset = RwSignal::new(UtcOffset::UTC);
    let ts = row.timestamp;
    Effect::new(move || {
        if let Some(ts) = ts {
            offset.set(local_offset(ts));
        }
    });
    let sender = row.sender.clone();
    let body = row.body.clone();
    let footer = move || delivery_label(&row, offset.get());

    view! {
        <div class=class title=sender>
            <p class="message__body">{body}</p>
            <span class=footer_class>{footer}</span>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(timestamp: Option<i64>, delivery: Delivery) -> MessageRow {
        MessageRow {
            id: "m1".into(),
            sender: "a@x.com".into(),
            body: "hi".into(),
            avatar_url: None,
            timestamp,
            delivery,
        }
    }

    #[test]
    fn delivery_label_variants() {
        assert_eq!(delivery_label(&row(Some(0), Delivery::Stored), UtcOffset::UTC), "00:00");
        assert_eq!(delivery_label(&row(None, Delivery::Pending), UtcOffset::UTC), "pending");
        assert_eq!(delivery_label(&row(None, Delivery::Failed), UtcOffset::UTC), "Not delivered");
    }

    #[test]
    fn delivery_label_uses_viewer_offset() {
        let offset = UtcOffset::from_hms(-5, 0, 0).unwrap();
        assert_eq!(delivery_label(&row(Some(0), Delivery::Stored), offset), "19:00");
    }
}
