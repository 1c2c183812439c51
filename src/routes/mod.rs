//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds HTTP + websocket endpoints and the server-rendered
//! Leptos pages under a single Axum router. Compiled client assets are served
//! from the Leptos site root under `/pkg`.

pub mod auth;
pub mod chats;
pub mod pages;
pub mod ws;

use std::path::PathBuf;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use leptos::prelude::LeptosOptions;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use pages::SiteState;

/// Full application router: pages, REST API, websocket, static assets.
pub fn app(state: AppState, leptos_options: LeptosOptions) -> Router {
    let site_root_path = PathBuf::from(leptos_options.site_root.as_ref());
    let site = SiteState { app: state, leptos_options };

    Router::new()
        .route("/", get(pages::plain_page))
        .route("/login", get(pages::plain_page))
        .route("/chat/{id}", get(pages::chat_page))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/chats", get(chats::list_chats).post(chats::create_chat))
        .route("/api/chats/{id}", get(chats::get_chat))
        .route("/api/chats/{id}/meta", get(chats::get_chat_meta))
        .route("/api/chats/{id}/messages", get(chats::list_chat_messages))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .nest_service("/pkg", ServeDir::new(site_root_path.join("pkg")))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(site)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
