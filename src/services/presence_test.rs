use super::*;
use crate::frame::Status;
use crate::state::test_helpers::{dummy_profile, seed_profile, test_app_state};

fn watch_request(email: &str) -> Frame {
    Frame::request("user:watch", Data::new()).with_data("email", email)
}

// =============================================================================
// touch / merge
// =============================================================================

#[tokio::test]
async fn touch_sets_last_seen_and_keeps_other_fields() {
    let state = test_app_state();
    seed_profile(&state, "b@x.com", Some(dummy_profile("b@x.com"))).await;

    let profile = touch_presence(&state, "b@x.com").await.unwrap();
    assert_eq!(profile.name.as_deref(), Some("Bea"));
    assert!(profile.last_seen.is_some());

    let profiles = state.profiles.read().await;
    let entry = profiles.get("b@x.com").unwrap();
    assert!(entry.dirty);
    assert_eq!(entry.version, 1);
}

#[tokio::test]
async fn touch_creates_missing_profile() {
    let state = test_app_state();
    seed_profile(&state, "new@x.com", None).await;

    let profile = touch_presence(&state, "new@x.com").await.unwrap();
    assert_eq!(profile.email, "new@x.com");
    assert_eq!(profile.name, None);
    assert!(profile.last_seen.is_some());
}

#[tokio::test]
async fn repeated_touches_advance_last_seen() {
    let state = test_app_state();
    seed_profile(&state, "a@x.com", None).await;

    let first = touch_presence(&state, "a@x.com").await.unwrap();
    let second = touch_presence(&state, "a@x.com").await.unwrap();
    assert!(second.last_seen > first.last_seen);
}

#[tokio::test]
async fn merge_profile_updates_name_only() {
    let state = test_app_state();
    let mut seeded = dummy_profile("b@x.com");
    seeded.last_seen = Some(42);
    seed_profile(&state, "b@x.com", Some(seeded)).await;

    let patch = ProfilePatch { name: Some("Beatrice".into()), ..ProfilePatch::default() };
    let profile = merge_profile(&state, "b@x.com", &patch).await.unwrap();
    assert_eq!(profile.name.as_deref(), Some("Beatrice"));
    assert_eq!(profile.last_seen, Some(42));
}

// =============================================================================
// watch
// =============================================================================

#[tokio::test]
async fn watch_returns_current_profile() {
    let state = test_app_state();
    seed_profile(&state, "b@x.com", Some(dummy_profile("b@x.com"))).await;
    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    let request = watch_request("b@x.com");

    let frame = watch(&state, "b@x.com", Uuid::new_v4(), &request, tx)
        .await
        .unwrap();
    assert_eq!(frame.status, Status::Item);
    assert_eq!(frame.parent_id, Some(request.id));
    assert_eq!(frame.data_str("email"), Some("b@x.com"));
    assert_eq!(frame.data.get("profile").unwrap()["name"], "Bea");
}

#[tokio::test]
async fn watch_missing_profile_reports_null() {
    let state = test_app_state();
    seed_profile(&state, "ghost@x.com", None).await;
    let (tx, _rx) = tokio::sync::mpsc::channel(8);

    let frame = watch(&state, "ghost@x.com", Uuid::new_v4(), &watch_request("ghost@x.com"), tx)
        .await
        .unwrap();
    assert!(frame.data.get("profile").unwrap().is_null());
}

#[tokio::test]
async fn watch_rejects_blank_email() {
    let state = test_app_state();
    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    let err = watch(&state, " ", Uuid::new_v4(), &watch_request(" "), tx)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "E_INVALID_EMAIL");
}

#[tokio::test]
async fn watch_rejects_handles_that_are_not_emails() {
    let state = test_app_state();
    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    let err = watch(&state, "bob", Uuid::new_v4(), &watch_request("bob"), tx)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "E_INVALID_EMAIL");
    assert!(state.profiles.read().await.is_empty());
}

#[tokio::test]
async fn watch_keys_on_normalized_email() {
    let state = test_app_state();
    seed_profile(&state, "b@x.com", Some(dummy_profile("b@x.com"))).await;
    let (tx, _rx) = tokio::sync::mpsc::channel(8);

    let frame = watch(&state, " B@X.com ", Uuid::new_v4(), &watch_request("B@X.com"), tx)
        .await
        .unwrap();
    assert_eq!(frame.data_str("email"), Some("b@x.com"));
    assert_eq!(state.profiles.read().await.len(), 1);
}

#[tokio::test]
async fn watchers_receive_touch_updates() {
    let state = test_app_state();
    seed_profile(&state, "b@x.com", Some(dummy_profile("b@x.com"))).await;
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let request = watch_request("b@x.com");
    watch(&state, "b@x.com", Uuid::new_v4(), &request, tx)
        .await
        .unwrap();

    let touched = touch_presence(&state, "b@x.com").await.unwrap();

    let frame = rx.try_recv().expect("profile update");
    assert_eq!(frame.parent_id, Some(request.id));
    assert_eq!(frame.data.get("profile").unwrap()["last_seen"].as_i64(), touched.last_seen);
}

#[tokio::test]
async fn unwatch_stops_updates() {
    let state = test_app_state();
    seed_profile(&state, "b@x.com", Some(dummy_profile("b@x.com"))).await;
    let client_id = Uuid::new_v4();
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    watch(&state, "b@x.com", client_id, &watch_request("b@x.com"), tx)
        .await
        .unwrap();

    assert!(unwatch(&state, "b@x.com", client_id).await.is_some());
    touch_presence(&state, "b@x.com").await.unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unwatch_all_clears_client_watches() {
    let state = test_app_state();
    seed_profile(&state, "b@x.com", None).await;
    seed_profile(&state, "c@x.com", None).await;
    let client_id = Uuid::new_v4();
    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    watch(&state, "b@x.com", client_id, &watch_request("b@x.com"), tx.clone())
        .await
        .unwrap();
    watch(&state, "c@x.com", client_id, &watch_request("c@x.com"), tx)
        .await
        .unwrap();

    unwatch_all(&state, client_id).await;

    let profiles = state.profiles.read().await;
    assert!(profiles.values().all(|entry| entry.watchers.is_empty()));
}

#[tokio::test]
async fn unwatch_drops_idle_missing_profile() {
    let state = test_app_state();
    seed_profile(&state, "ghost@x.com", None).await;
    let client_id = Uuid::new_v4();
    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    watch(&state, "ghost@x.com", client_id, &watch_request("ghost@x.com"), tx)
        .await
        .unwrap();

    assert!(unwatch(&state, "ghost@x.com", client_id).await.is_some());
    assert!(!state.profiles.read().await.contains_key("ghost@x.com"));
}

#[tokio::test]
async fn unwatch_keeps_entry_with_other_watchers_or_a_profile() {
    let state = test_app_state();
    seed_profile(&state, "ghost@x.com", None).await;
    seed_profile(&state, "b@x.com", Some(dummy_profile("b@x.com"))).await;
    let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    for client_id in [first, second] {
        watch(&state, "ghost@x.com", client_id, &watch_request("ghost@x.com"), tx.clone())
            .await
            .unwrap();
    }
    watch(&state, "b@x.com", first, &watch_request("b@x.com"), tx)
        .await
        .unwrap();

    unwatch(&state, "ghost@x.com", first).await;
    unwatch(&state, "b@x.com", first).await;

    let profiles = state.profiles.read().await;
    assert_eq!(profiles["ghost@x.com"].watchers.len(), 1);
    assert!(profiles["b@x.com"].watchers.is_empty());
}

#[tokio::test]
async fn unwatch_all_prunes_idle_entries() {
    let state = test_app_state();
    seed_profile(&state, "ghost@x.com", None).await;
    seed_profile(&state, "a@x.com", None).await;
    let client_id = Uuid::new_v4();
    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    watch(&state, "ghost@x.com", client_id, &watch_request("ghost@x.com"), tx)
        .await
        .unwrap();
    touch_presence(&state, "a@x.com").await.unwrap();

    unwatch_all(&state, client_id).await;

    let profiles = state.profiles.read().await;
    assert!(!profiles.contains_key("ghost@x.com"));
    assert!(profiles.contains_key("a@x.com"));
}

#[tokio::test]
async fn flush_profiles_with_empty_batch_is_noop() {
    let state = test_app_state();
    assert!(flush_profiles(&state.pool, &[]).await.is_ok());
}
