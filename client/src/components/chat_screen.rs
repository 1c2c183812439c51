//! Conversation View: header with recipient presence, message list, composer.
//!
//! SYSTEM CONTEXT
//! ==============
//! Rendered by the chat page with the Conversation Loader payload. The
//! screen opens `chat:subscribe` and a `user:watch` on the recipient while
//! the websocket is connected and closes both on unmount. All state changes
//! go through `ChatState`; this module only wires signals, frames and DOM.

use leptos::prelude::*;

use crate::app::FrameSender;
use crate::components::message_row::MessageItem;
use crate::net::requests;
use crate::net::types::{ChatMeta, ConversationPayload};
use crate::state::auth::AuthState;
use crate::state::chat::{ChatState, presence_label};
use crate::state::connection::ConnectionState;
use crate::util::recipient::avatar_initial;
use crate::util::time_ago::now_ms;

#[component]
pub fn ChatScreen(chat: ChatMeta, messages: String, #[prop(into)] on_back: Callback<()>) -> impl IntoView {
    let auth = expect_context::<RwSignal<AuthState>>();
    let connection = expect_context::<RwSignal<ConnectionState>>();
    let state = expect_context::<RwSignal<ChatState>>();
    let sender = expect_context::<RwSignal<FrameSender>>();

    // The app seeds state from the page payload; reopen only for another one.
    if state.with_untracked(|s| s.conversation_id() != chat.id) {
        let me = auth.with_untracked(|a| a.email().map(str::to_owned));
        state.set(ChatState::open(&ConversationPayload { chat, messages }, me.as_deref()));
    }

    let conversation_id = state.with_untracked(|s| s.conversation_id().to_owned());
    let has_participants = state.with_untracked(|s| !s.chat.users.is_empty());

    let connected = Memo::new(move |_| connection.with(ConnectionState::is_connected));
    let recipient = Memo::new(move |_| state.with(|s| s.recipient.clone()));
    let scroll_requests = Memo::new(move |_| state.with(|s| s.scroll_requests));
    let end_ref = NodeRef::<leptos::html::Div>::new();
    let watched = RwSignal::new(None::<String>);

    Effect::new(move || {
        let me = auth.with(|a| a.email().map(str::to_owned));
        state.maybe_update(|s| s.set_viewer(me.as_deref()));
    });

    // (Re)subscribe whenever the connection comes up.
    let subscribe_id = conversation_id.clone();
    Effect::new(move || {
        if !connected.get() || !has_participants {
            return;
        }
        let frame = requests::subscribe_frame(&subscribe_id);
        if sender.with_untracked(|s| s.send(&frame)) {
            state.update(|s| s.subscription_id = Some(frame.id));
        }
    });

    // Watch the recipient's profile, following recipient changes.
    Effect::new(move || {
        let target = recipient.get();
        if !connected.get() {
            watched.set(None);
            return;
        }
        let previous = watched.get_untracked();
        if previous == target {
            return;
        }
        if let Some(previous) = previous {
            sender.with_untracked(|s| s.send(&requests::unwatch_frame(&previous)));
        }
        if let Some(email) = target.clone() {
            let frame = requests::watch_frame(&email);
            if sender.with_untracked(|s| s.send(&frame)) {
                state.update(|s| s.watch_id = Some(frame.id));
            }
        }
        watched.set(target);
    });

    let cleanup_id = conversation_id.clone();
    on_cleanup(move || {
        let Some(sender) = sender.try_get_untracked() else {
            return;
        };
        if has_participants {
            sender.send(&requests::unsubscribe_frame(&cleanup_id));
        }
        if let Some(email) = watched.try_get_untracked().flatten() {
            sender.send(&requests::unwatch_frame(&email));
        }
    });

    Effect::new(move || {
        if scroll_requests.get() == 0 {
            return;
        }
        #[cfg(feature = "hydrate")]
        {
            if let Some(el) = end_ref.get() {
                let options = web_sys::ScrollIntoViewOptions::new();
                options.set_behavior(web_sys::ScrollBehavior::Smooth);
                options.set_block(web_sys::ScrollLogicalPosition::Start);
                el.scroll_into_view_with_scroll_into_view_options(&options);
            }
        }
    });

    // Presence text ages while the screen is open.
    let now = RwSignal::new(now_ms());
    #[cfg(feature = "hydrate")]
    {
        let alive = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
        let alive_task = alive.clone();
        leptos::task::spawn_local(async move {
            loop {
                gloo_timers::future::sleep(std::time::Duration::from_secs(30)).await;
                if !alive_task.load(std::sync::atomic::Ordering::Relaxed) {
                    break;
                }
                now.set(now_ms());
            }
        });
        on_cleanup(move || alive.store(false, std::sync::atomic::Ordering::Relaxed));
    }

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let Some(me) = auth.with_untracked(|a| a.user.clone()) else {
            return;
        };
        let Some(plan) = state.try_update(|s| s.submit(&me)).flatten() else {
            return;
        };
        // Independent writes: a failed touch does not hold back the message.
        sender.with_untracked(|s| s.send(&plan.touch));
        if !sender.with_untracked(|s| s.send(&plan.add)) {
            leptos::logging::warn!("message {} not sent: no connection", plan.message_id);
            state.update(|s| s.dispatch_failed(&plan));
        }
    };

    let header_name = move || state.with(ChatState::display_name);
    let presence = move || state.with(|s| presence_label(&s.profile, now.get()));
    let avatar = move || {
        let (url, initial) = state.with(|s| (s.avatar_url(), avatar_initial(&s.display_name())));
        match url {
            Some(url) => view! { <img class="avatar" src=url alt=""/> }.into_any(),
            None => view! { <div class="avatar avatar--initial">{initial}</div> }.into_any(),
        }
    };
    let signed_in = move || auth.with(|a| a.user.is_some());

    view! {
        <section class="chat-screen">
            <header class="chat-screen__header">
                {avatar}
                <div class="chat-screen__info">
                    <h3>{header_name}</h3>
                    <p>{presence}</p>
                </div>
                <div class="chat-screen__icons">
                    <button class="icon-button chat-screen__back" type="button" title="Back" on:click=move |_| on_back.run(())>
                        "‹"
                    </button>
                    <span class="icon-button" aria-hidden="true">"📎"</span>
                    <span class="icon-button" aria-hidden="true">"⋮"</span>
                </div>
            </header>

            <div class="chat-screen__messages">
                {move || {
                    let me = auth.with(|a| a.email().map(str::to_owned));
                    state
                        .with(ChatState::rows)
                        .into_iter()
                        .map(|row| {
                            let own = me.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(&row.sender));
                            view! { <MessageItem row=row own=own/> }
                        })
                        .collect::<Vec<_>>()
                }}
                <div class="chat-screen__end" node_ref=end_ref></div>
            </div>

            <Show
                when=signed_in
                fallback=|| view! {
                    <p class="chat-screen__signin">
                        <a href="/login" rel="external">"Sign in"</a>
                        " to reply."
                    </p>
                }
            >
                <form class="chat-screen__composer" on:submit=on_submit>
                    <span class="icon-button" aria-hidden="true">"☺"</span>
                    <input
                        class="chat-screen__input"
                        type="text"
                        placeholder="Type a message"
                        prop:value=move || state.with(|s| s.input.clone())
                        on:input=move |ev| state.update(|s| s.input = event_target_value(&ev))
                    />
                    <button hidden type="submit">"Send Message"</button>
                    <span class="icon-button" aria-hidden="true">"🎤"</span>
                </form>
            </Show>
        </section>
    }
}
