//! Conversation page: sidebar plus the conversation screen.
//!
//! SYSTEM CONTEXT
//! ==============
//! Served at `/chat/{id}`. The server has already run the Conversation
//! Loader for the route id and embedded the payload; this page hands it to
//! `ChatScreen` and owns the narrow-layout toggle between sidebar and
//! screen.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use leptos::prelude::*;
use leptos_meta::Title;
use leptos_router::hooks::use_params_map;

use crate::components::chat_screen::ChatScreen;
use crate::components::sidebar::Sidebar;
use crate::net::types::{ChatMeta, ConversationPayload, PageData};
use crate::state::chat::ChatState;

/// Payload for the route, falling back to an empty conversation when the
/// page data belongs to another route.
fn payload_for_route(page_data: Option<PageData>, route_id: &str) -> ConversationPayload {
    page_data
        .and_then(|d| d.conversation)
        .filter(|p| p.chat.id == route_id)
        .unwrap_or_else(|| ConversationPayload {
            chat: ChatMeta { id: route_id.to_owned(), ..ChatMeta::default() },
            messages: "[]".to_owned(),
        })
}

fn page_title(display_name: &str) -> String {
    format!("Chat with {display_name}")
}

#[component]
pub fn ChatPage() -> impl IntoView {
    let params = use_params_map();
    let state = expect_context::<RwSignal<ChatState>>();
    let route_id = params.with_untracked(|p| p.get("id").unwrap_or_default());
    let payload = payload_for_route(use_context::<PageData>(), &route_id);
    let missing = payload.chat.users.is_empty();

    // Narrow layouts show either the sidebar or the screen.
    let show_sidebar = RwSignal::new(false);
    let on_back = Callback::new(move |()| show_sidebar.set(true));

    let title = move || page_title(&state.with(ChatState::display_name));
    let layout_class = move || if show_sidebar.get() { "chat-layout chat-layout--sidebar" } else { "chat-layout" };

    view! {
        <Title text=title/>
        <div class=layout_class>
            <Sidebar active_id=route_id.clone()/>
            <main class="chat-layout__main">
                <Show when=move || missing>
                    <p class="chat-layout__notice">"Conversation not found"</p>
                </Show>
                <ChatScreen chat=payload.chat.clone() messages=payload.messages.clone() on_back=on_back/>
            </main>
        </div>
    }
}
