//! Persistence service: background flush for dirty store state.
//!
//! DESIGN
//! ======
//! A background task flushes appended messages and merged profiles, then
//! sleeps `STORE_FLUSH_INTERVAL_MS` before the next cycle. Websocket handling
//! never waits on Postgres for writes.
//!
//! ERROR HANDLING
//! ==============
//! Dirty flags are cleared only after successful writes. This prioritizes
//! durability over duplicate flush attempts: repeated inserts are skipped by
//! `ON CONFLICT`, silent data loss is not acceptable.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::services::{message, presence};
use crate::state::{AppState, StoredMessage, UserProfile};

/// Spawn the background persistence task. Returns a handle for shutdown.
pub fn spawn_persistence_task(state: AppState) -> JoinHandle<()> {
    let flush_interval_ms = state.config.store_flush_interval_ms;
    info!(flush_interval_ms, "store persistence flush configured");
    tokio::spawn(async move {
        loop {
            flush_all_dirty(&state).await;
            tokio::time::sleep(Duration::from_millis(flush_interval_ms)).await;
        }
    })
}

/// Flush everything currently dirty. Also called once on shutdown.
pub async fn flush_all_dirty(state: &AppState) {
    // PHASE: FLUSH MESSAGES PER CONVERSATION
    for batch in collect_dirty_messages(state).await {
        match message::flush_messages(&state.pool, &batch.messages).await {
            Ok(conflicts) => {
                clear_flushed_messages(state, batch.conversation_id, &batch.messages).await;
                message::drop_conflicting(state, batch.conversation_id, &conflicts).await;
            }
            Err(e) => {
                error!(error = %e, count = batch.messages.len(), conversation_id = %batch.conversation_id, "message flush failed");
            }
        }
    }

    // PHASE: FLUSH PROFILES
    let profiles = collect_dirty_profiles(state).await;
    if profiles.is_empty() {
        return;
    }
    let rows = profiles
        .iter()
        .map(|(profile, _)| profile.clone())
        .collect::<Vec<_>>();
    match presence::flush_profiles(&state.pool, &rows).await {
        Ok(()) => clear_flushed_profiles(state, &profiles).await,
        Err(e) => error!(error = %e, count = rows.len(), "profile flush failed"),
    }
}

#[derive(Debug)]
pub(crate) struct DirtyMessageBatch {
    pub(crate) conversation_id: Uuid,
    pub(crate) messages: Vec<StoredMessage>,
}

/// Snapshot dirty messages under the lock; I/O happens lock-free.
pub(crate) async fn collect_dirty_messages(state: &AppState) -> Vec<DirtyMessageBatch> {
    let conversations = state.conversations.read().await;
    conversations
        .iter()
        .filter(|(_, cs)| !cs.dirty.is_empty())
        .map(|(conversation_id, cs)| DirtyMessageBatch {
            conversation_id: *conversation_id,
            messages: cs
                .messages
                .iter()
                .filter(|m| cs.dirty.contains(&m.id))
                .cloned()
                .collect(),
        })
        .filter(|batch| !batch.messages.is_empty())
        .collect()
}

pub(crate) async fn clear_flushed_messages(state: &AppState, conversation_id: Uuid, flushed: &[StoredMessage]) {
    let mut conversations = state.conversations.write().await;
    let Some(cs) = conversations.get_mut(&conversation_id) else {
        return;
    };
    for m in flushed {
        cs.dirty.remove(&m.id);
    }
}

/// Dirty profiles with the version each snapshot was taken at.
pub(crate) async fn collect_dirty_profiles(state: &AppState) -> Vec<(UserProfile, u64)> {
    let profiles = state.profiles.read().await;
    profiles
        .values()
        .filter(|entry| entry.dirty)
        .filter_map(|entry| {
            entry
                .profile
                .clone()
                .map(|profile| (profile, entry.version))
        })
        .collect()
}

pub(crate) async fn clear_flushed_profiles(state: &AppState, flushed: &[(UserProfile, u64)]) {
    let mut profiles = state.profiles.write().await;
    for (profile, version) in flushed {
        // EDGE: keep dirty flag if the profile changed again after snapshot.
        if let Some(entry) = profiles.get_mut(&profile.email) {
            if entry.version == *version {
                entry.dirty = false;
            }
        }
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
