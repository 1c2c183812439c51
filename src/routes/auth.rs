//! Auth routes: development sign-in, session management, WS tickets.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use tracing::{error, info};

use crate::services::{presence, session};
use crate::state::{AppState, ProfilePatch};

pub(crate) const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { user, token: token.to_owned() })
    }
}

/// Signed-in user if any. Pages render for anonymous visitors too.
pub struct MaybeUser(pub Option<session::SessionUser>);

impl<S> axum::extract::FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(auth) => Ok(Self(Some(auth.user))),
            Err(StatusCode::UNAUTHORIZED) => Ok(Self(None)),
            Err(status) => Err(status),
        }
    }
}

fn session_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    email: String,
    name: Option<String>,
    avatar_url: Option<String>,
}

/// `POST /api/auth/login`: development sign-in keyed by email.
///
/// Enabled only when `DEV_LOGIN` is true.
pub async fn login(State(state): State<AppState>, jar: CookieJar, Json(body): Json<LoginBody>) -> Response {
    if !state.config.dev_login {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(email) = session::normalize_email(&body.email) else {
        return (StatusCode::BAD_REQUEST, "invalid email").into_response();
    };
    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let avatar_url = body
        .avatar_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    let user = match session::upsert_user(&state.pool, &email, name, avatar_url).await {
        Ok(user) => user,
        Err(e) => {
            error!(error = %e, "user upsert failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user").into_response();
        }
    };

    // Keep resident profile watchers in step with the stored row.
    let patch = ProfilePatch { name: user.name.clone(), avatar_url: user.avatar_url.clone(), last_seen: None };
    if let Err(e) = presence::merge_profile(&state, &email, &patch).await {
        error!(error = %e, %email, "profile merge after sign-in failed");
    }

    let token = match session::create_session(&state.pool, &email, state.config.session_ttl_hours).await {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "session creation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session").into_response();
        }
    };

    info!(%email, "signed in");
    let jar = jar.add(session_cookie(token, state.config.cookie_secure));
    (jar, Json(user)).into_response()
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<session::SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    let _ = session::delete_session(&state.pool, &auth.token).await;

    let mut cookie = session_cookie(String::new(), state.config.cookie_secure);
    cookie.set_max_age(Duration::ZERO);

    let jar = CookieJar::new().add(cookie);
    (jar, StatusCode::NO_CONTENT)
}

/// `POST /api/auth/ws-ticket`: create a one-time WS ticket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, StatusCode> {
    let ticket = session::create_ws_ticket(&state.pool, &auth.user.email)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
