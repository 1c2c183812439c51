//! Session and WS-ticket management.
//!
//! ARCHITECTURE
//! ============
//! HTTP auth uses long-lived session tokens, while websocket upgrades use
//! one-time short-lived tickets to avoid sending cookies over WS query params.
//! Users are keyed by their normalized email handle, the same handle stored
//! in conversation participant lists and message senders.
//!
//! TRADE-OFFS
//! ==========
//! Ticket consumption is destructive (`DELETE ... RETURNING`) to guarantee
//! single use; this favors replay safety over reconnect convenience.

use std::fmt::Write;

use rand::Rng;
use sqlx::{PgPool, Row};

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Generate a short-lived 16-byte hex WS ticket.
#[must_use]
pub(crate) fn generate_ws_ticket() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Lowercase and trim an email handle; `None` if it is not `local@domain`.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || normalized.contains(char::is_whitespace) {
        return None;
    }
    Some(normalized)
}

/// User row returned from session validation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionUser {
    /// Normalized email handle.
    pub email: String,
    /// Display name, if the user provided one.
    pub name: Option<String>,
    /// Avatar image URL, if available.
    pub avatar_url: Option<String>,
}

/// Insert or update a user row at sign-in. Absent fields keep stored values.
pub async fn upsert_user(
    pool: &PgPool,
    email: &str,
    name: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<SessionUser, sqlx::Error> {
    let row = sqlx::query(
        r"INSERT INTO users (email, name, avatar_url) VALUES ($1, $2, $3)
          ON CONFLICT (email) DO UPDATE SET
              name = COALESCE(EXCLUDED.name, users.name),
              avatar_url = COALESCE(EXCLUDED.avatar_url, users.avatar_url)
          RETURNING email, name, avatar_url",
    )
    .bind(email)
    .bind(name)
    .bind(avatar_url)
    .fetch_one(pool)
    .await?;

    Ok(SessionUser { email: row.get("email"), name: row.get("name"), avatar_url: row.get("avatar_url") })
}

/// Create a session for the given user, returning the token.
pub async fn create_session(pool: &PgPool, email: &str, ttl_hours: i64) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let ttl_hours = i32::try_from(ttl_hours).unwrap_or(i32::MAX);
    sqlx::query("INSERT INTO sessions (token, email, expires_at) VALUES ($1, $2, now() + make_interval(hours => $3))")
        .bind(&token)
        .bind(email)
        .bind(ttl_hours)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Validate a session token and return the associated user.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionUser>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT u.email, u.name, u.avatar_url
          FROM sessions s
          JOIN users u ON u.email = s.email
          WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| SessionUser { email: r.get("email"), name: r.get("name"), avatar_url: r.get("avatar_url") }))
}

/// Delete a session by token.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Create a short-lived WS ticket for the given user.
pub async fn create_ws_ticket(pool: &PgPool, email: &str) -> Result<String, sqlx::Error> {
    let ticket = generate_ws_ticket();
    sqlx::query("INSERT INTO ws_tickets (ticket, email) VALUES ($1, $2)")
        .bind(&ticket)
        .bind(email)
        .execute(pool)
        .await?;
    Ok(ticket)
}

/// Consume a WS ticket atomically, returning the user's email if valid.
pub async fn consume_ws_ticket(pool: &PgPool, ticket: &str) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("DELETE FROM ws_tickets WHERE ticket = $1 AND expires_at > now() RETURNING email")
        .bind(ticket)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("email")))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
