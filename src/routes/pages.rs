//! Server-rendered pages.
//!
//! SYSTEM CONTEXT
//! ==============
//! Each page request resolves its data up front (the signed-in user and, for
//! `/chat/{id}`, the Conversation Loader payload), hands it to the Leptos app
//! as context, and streams the rendered HTML. The app embeds the same data in
//! the document so hydration starts from identical state.

use axum::extract::{FromRef, Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leptos::prelude::*;
use tracing::error;
use uuid::Uuid;

use super::auth::MaybeUser;
use crate::services::conversation::{self, ConversationPayload};
use crate::services::session::SessionUser;
use crate::state::AppState;

/// Router state for page handlers: live store plus Leptos site options.
#[derive(Clone)]
pub struct SiteState {
    pub app: AppState,
    pub leptos_options: LeptosOptions,
}

impl FromRef<SiteState> for AppState {
    fn from_ref(site: &SiteState) -> Self {
        site.app.clone()
    }
}

impl FromRef<SiteState> for LeptosOptions {
    fn from_ref(site: &SiteState) -> Self {
        site.leptos_options.clone()
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

pub(crate) fn viewer_from_session(user: SessionUser) -> client::net::types::User {
    client::net::types::User { email: user.email, name: user.name, avatar_url: user.avatar_url }
}

pub(crate) fn page_payload(payload: ConversationPayload) -> client::net::types::ConversationPayload {
    client::net::types::ConversationPayload {
        chat: client::net::types::ChatMeta {
            id: payload.chat.id.to_string(),
            users: payload.chat.users,
            created_at: payload.chat.created_at,
        },
        messages: payload.messages,
    }
}

/// Payload for a route id that is not a conversation id at all.
pub(crate) fn unknown_payload(raw_id: &str) -> client::net::types::ConversationPayload {
    client::net::types::ConversationPayload {
        chat: client::net::types::ChatMeta { id: raw_id.to_owned(), users: Vec::new(), created_at: None },
        messages: "[]".to_owned(),
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn render(site: SiteState, page_data: client::net::types::PageData, req: Request) -> Response {
    let options = site.leptos_options.clone();
    let handler = leptos_axum::render_app_to_stream_with_context(
        move || provide_context(page_data.clone()),
        move || client::app::shell(options.clone()),
    );
    handler(req).await.into_response()
}

/// `GET /chat/{id}`: Conversation Loader, then the conversation screen.
pub async fn chat_page(State(site): State<SiteState>, MaybeUser(viewer): MaybeUser, Path(raw_id): Path<String>, req: Request) -> Response {
    let conversation = match Uuid::parse_str(&raw_id) {
        Ok(id) => match conversation::load_conversation(&site.app, id).await {
            Ok(payload) => page_payload(payload),
            Err(e) => {
                error!(error = %e, conversation_id = %id, "conversation load failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load conversation").into_response();
            }
        },
        Err(_) => unknown_payload(&raw_id),
    };

    let page_data = client::net::types::PageData { viewer: viewer.map(viewer_from_session), conversation: Some(conversation) };
    render(site, page_data, req).await
}

/// `GET /` and `GET /login`: pages that only need the signed-in user.
pub async fn plain_page(State(site): State<SiteState>, MaybeUser(viewer): MaybeUser, req: Request) -> Response {
    let page_data = client::net::types::PageData { viewer: viewer.map(viewer_from_session), conversation: None };
    render(site, page_data, req).await
}
