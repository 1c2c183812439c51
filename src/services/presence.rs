//! Presence service: user profile documents, merge writes, and watches.
//!
//! DESIGN
//! ======
//! Profiles are merge-only documents keyed by email handle. A touch merges
//! `last_seen` with server time; sign-in merges name and avatar. Each change
//! is pushed to the profile's watchers as an item frame replying to their
//! `user:watch` request, and the entry is marked dirty for the persistence
//! task.
//!
//! ERROR HANDLING
//! ==============
//! Profiles are read from Postgres on first use. A failed read leaves the
//! entry unloaded so the next caller retries it.

use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame};
use crate::services::session;
use crate::state::{AppState, ProfileEntry, ProfilePatch, Subscriber, UserProfile};

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("invalid email: {0}")]
    InvalidEmail(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for PresenceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail(_) => "E_INVALID_EMAIL",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

// =============================================================================
// LOADING
// =============================================================================

async fn ensure_loaded(state: &AppState, email: &str) -> Result<(), PresenceError> {
    if state
        .profiles
        .read()
        .await
        .get(email)
        .is_some_and(|entry| entry.loaded)
    {
        return Ok(());
    }

    let row = sqlx::query("SELECT email, name, avatar_url, last_seen FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&state.pool)
        .await?;
    let stored = row.map(|r| UserProfile {
        email: r.get("email"),
        name: r.get("name"),
        avatar_url: r.get("avatar_url"),
        last_seen: r.get("last_seen"),
    });

    let mut profiles = state.profiles.write().await;
    let entry = profiles.entry(email.to_owned()).or_default();
    if !entry.loaded {
        // EDGE: local merges made before the read completed win over storage.
        entry.profile = match (stored, entry.profile.take()) {
            (Some(mut stored), Some(local)) => {
                stored.merge(&ProfilePatch { name: local.name, avatar_url: local.avatar_url, last_seen: local.last_seen });
                Some(stored)
            }
            (stored, local) => local.or(stored),
        };
        entry.loaded = true;
    }
    Ok(())
}

// =============================================================================
// WRITES
// =============================================================================

/// Merge `patch` into the profile of `email`, creating it if absent, and
/// notify watchers.
///
/// # Errors
///
/// Returns a database error if the profile must be read and the read fails.
pub async fn merge_profile(state: &AppState, email: &str, patch: &ProfilePatch) -> Result<UserProfile, PresenceError> {
    ensure_loaded(state, email).await?;

    let mut profiles = state.profiles.write().await;
    let entry = profiles.entry(email.to_owned()).or_default();
    let profile = entry.profile.get_or_insert_with(|| UserProfile { email: email.to_owned(), ..UserProfile::default() });
    profile.merge(patch);
    let updated = profile.clone();
    entry.dirty = true;
    entry.version += 1;
    broadcast_profile(email, entry);
    Ok(updated)
}

/// Record activity: merge `last_seen` with the current server time.
///
/// # Errors
///
/// Returns a database error if the profile must be read and the read fails.
pub async fn touch_presence(state: &AppState, email: &str) -> Result<UserProfile, PresenceError> {
    let now = state.clock.now_ms();
    let profile = merge_profile(state, email, &ProfilePatch { last_seen: Some(now), ..ProfilePatch::default() }).await?;
    info!(%email, last_seen = now, "presence touched");
    Ok(profile)
}

// =============================================================================
// WATCHES
// =============================================================================

/// Build a profile item frame replying to a watch request.
#[must_use]
pub fn profile_frame(request: &Frame, email: &str, profile: Option<&UserProfile>) -> Frame {
    let mut data = Data::new();
    data.insert("email".into(), serde_json::Value::String(email.to_owned()));
    data.insert(
        "profile".into(),
        profile
            .and_then(|p| serde_json::to_value(p).ok())
            .unwrap_or(serde_json::Value::Null),
    );
    request.item(data)
}

/// Watch a profile. Returns the current value; changes arrive on `tx`.
///
/// # Errors
///
/// Returns `InvalidEmail` unless the handle is `local@domain`, or a
/// database error.
pub async fn watch(
    state: &AppState,
    email: &str,
    client_id: Uuid,
    request: &Frame,
    tx: tokio::sync::mpsc::Sender<Frame>,
) -> Result<Frame, PresenceError> {
    let Some(email) = session::normalize_email(email) else {
        return Err(PresenceError::InvalidEmail(email.to_owned()));
    };
    ensure_loaded(state, &email).await?;

    let mut profiles = state.profiles.write().await;
    let entry = profiles.entry(email.clone()).or_default();
    entry
        .watchers
        .insert(client_id, Subscriber { tx, request: request.clone() });
    Ok(profile_frame(request, &email, entry.profile.as_ref()))
}

/// Stop watching a profile. Returns the original watch request.
pub async fn unwatch(state: &AppState, email: &str, client_id: Uuid) -> Option<Frame> {
    let email = session::normalize_email(email)?;
    let mut profiles = state.profiles.write().await;
    let entry = profiles.get_mut(&email)?;
    let removed = entry.watchers.remove(&client_id);
    if is_idle(entry) {
        profiles.remove(&email);
    }
    removed.map(|watcher| watcher.request)
}

/// Drop every watch held by a disconnected client.
pub async fn unwatch_all(state: &AppState, client_id: Uuid) {
    let mut profiles = state.profiles.write().await;
    profiles.retain(|_, entry| {
        entry.watchers.remove(&client_id);
        !is_idle(entry)
    });
}

/// Nothing to push, flush or serve: a known-missing profile nobody watches.
fn is_idle(entry: &ProfileEntry) -> bool {
    entry.watchers.is_empty() && !entry.dirty && entry.profile.is_none()
}

fn broadcast_profile(email: &str, entry: &ProfileEntry) {
    for (client_id, watcher) in &entry.watchers {
        let frame = profile_frame(&watcher.request, email, entry.profile.as_ref());
        if let Err(e) = watcher.tx.try_send(frame) {
            warn!(%email, %client_id, error = %e, "profile update dropped");
        }
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Upsert profiles with merge semantics: stored fields survive absent ones
/// and `last_seen` never moves backwards.
///
/// # Errors
///
/// Returns a database error if the transaction fails.
pub async fn flush_profiles(pool: &PgPool, profiles: &[UserProfile]) -> Result<(), sqlx::Error> {
    if profiles.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for p in profiles {
        sqlx::query(
            r"INSERT INTO users (email, name, avatar_url, last_seen) VALUES ($1, $2, $3, $4)
              ON CONFLICT (email) DO UPDATE SET
                  name = COALESCE(EXCLUDED.name, users.name),
                  avatar_url = COALESCE(EXCLUDED.avatar_url, users.avatar_url),
                  last_seen = GREATEST(EXCLUDED.last_seen, users.last_seen)",
        )
        .bind(&p.email)
        .bind(&p.name)
        .bind(&p.avatar_url)
        .bind(p.last_seen)
        .execute(tx.as_mut())
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
