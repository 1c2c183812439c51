//! Conversation sidebar: signed-in user, new-chat form, conversation list.

use leptos::prelude::*;

use crate::state::auth::AuthState;
use crate::state::chats::{ChatsState, chat_label};
use crate::util::recipient::avatar_initial;

#[component]
pub fn Sidebar(#[prop(optional, into)] active_id: Option<String>) -> impl IntoView {
    let auth = expect_context::<RwSignal<AuthState>>();
    let chats = expect_context::<RwSignal<ChatsState>>();
    let recipient = RwSignal::new(String::new());
    let create_error = RwSignal::new(None::<String>);
    let busy = RwSignal::new(false);

    #[cfg(feature = "hydrate")]
    {
        if auth.with_untracked(|a| a.user.is_some()) {
            chats.update(|s| s.loading = true);
            leptos::task::spawn_local(async move {
                match crate::net::api::list_chats().await {
                    Ok(items) => chats.update(|s| s.set_items(items)),
                    Err(e) => chats.update(|s| s.set_error(e)),
                }
            });
        }
    }

    let on_create = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if busy.get() {
            return;
        }
        let value = recipient.get().trim().to_owned();
        if value.is_empty() {
            create_error.set(Some("Enter an email address.".to_owned()));
            return;
        }
        busy.set(true);
        create_error.set(None);

        #[cfg(feature = "hydrate")]
        leptos::task::spawn_local(async move {
            match crate::net::api::create_chat(&value).await {
                Ok(id) => {
                    if let Some(window) = web_sys::window() {
                        let _ = window.location().set_href(&format!("/chat/{id}"));
                    }
                }
                Err(e) => {
                    create_error.set(Some(e));
                    busy.set(false);
                }
            }
        });
    };

    let on_logout = move |_| {
        #[cfg(feature = "hydrate")]
        leptos::task::spawn_local(async move {
            crate::net::api::logout().await;
            auth.update(|a| a.user = None);
            if let Some(w) = web_sys::window() {
                let _ = w.location().set_href("/login");
            }
        });
    };

    let me = move || auth.with(|a| a.email().map(str::to_owned));
    let identity = move || {
        auth.with(|a| {
            a.user
                .as_ref()
                .map(|u| u.name.clone().unwrap_or_else(|| u.email.clone()))
                .unwrap_or_default()
        })
    };

    view! {
        <aside class="sidebar">
            <header class="sidebar__header">
                <div class="avatar avatar--initial">{move || avatar_initial(&identity())}</div>
                <span class="sidebar__me">{identity}</span>
                <button class="sidebar__logout" type="button" on:click=on_logout>"Sign out"</button>
            </header>

            <form class="sidebar__new" on:submit=on_create>
                <input
                    class="sidebar__input"
                    type="email"
                    placeholder="Start a chat by email"
                    prop:value=move || recipient.get()
                    on:input=move |ev| recipient.set(event_target_value(&ev))
                />
                <button class="sidebar__button" type="submit" disabled=move || busy.get()>"Start"</button>
            </form>
            <Show when=move || create_error.get().is_some()>
                <p class="sidebar__error">{move || create_error.get().unwrap_or_default()}</p>
            </Show>

            <nav class="sidebar__list">
                {move || {
                    let state = chats.get();
                    if state.loading {
                        return view! { <p class="sidebar__empty">"Loading chats..."</p> }.into_any();
                    }
                    if let Some(error) = state.error {
                        return view! { <p class="sidebar__error">{error}</p> }.into_any();
                    }
                    if state.items.is_empty() {
                        return view! { <p class="sidebar__empty">"No conversations yet"</p> }.into_any();
                    }
                    let me = me();
                    state
                        .items
                        .into_iter()
                        .map(|chat| {
                            let label = chat_label(&chat, me.as_deref());
                            let initial = avatar_initial(&label);
                            let class = if active_id.as_deref() == Some(chat.id.as_str()) {
                                "sidebar__chat sidebar__chat--active"
                            } else {
                                "sidebar__chat"
                            };
                            view! {
                                <a class=class href=format!("/chat/{}", chat.id) rel="external">
                                    <div class="avatar avatar--initial">{initial}</div>
                                    <span>{label}</span>
                                </a>
                            }
                        })
                        .collect::<Vec<_>>()
                        .into_any()
                }}
            </nav>
        </aside>
    }
}
