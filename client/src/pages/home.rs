//! Landing page: the conversation list with an empty screen beside it.

use leptos::prelude::*;
use leptos_router::hooks::use_navigate;

use crate::components::sidebar::Sidebar;
use crate::state::auth::AuthState;
use crate::util::auth::install_unauth_redirect;

/// Redirects to `/login` if the user is not authenticated.
#[component]
pub fn HomePage() -> impl IntoView {
    let auth = expect_context::<RwSignal<AuthState>>();
    install_unauth_redirect(auth, use_navigate());

    view! {
        <div class="chat-layout chat-layout--sidebar">
            <Sidebar/>
            <main class="chat-layout__main chat-layout__main--empty">
                <p>"Select a conversation or start a new one."</p>
            </main>
        </div>
    }
}
