use super::*;
use crate::frame::{Data, Status};
use crate::state::test_helpers::{dummy_message, seed_conversation, seed_conversation_with_messages, test_app_state};

fn subscribe_request(conversation_id: Uuid) -> Frame {
    Frame::request("chat:subscribe", Data::new()).with_data("conversation_id", conversation_id.to_string())
}

#[tokio::test]
async fn subscribe_returns_initial_ordered_snapshot() {
    let state = test_app_state();
    let id = seed_conversation_with_messages(
        &state,
        &["a@x.com", "b@x.com"],
        vec![dummy_message("b@x.com", "two", 20, 2), dummy_message("a@x.com", "one", 10, 1)],
    )
    .await;
    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    let request = subscribe_request(id);

    let snapshot = subscribe(&state, id, Uuid::new_v4(), &request, tx)
        .await
        .unwrap();

    assert_eq!(snapshot.status, Status::Item);
    assert_eq!(snapshot.parent_id, Some(request.id));
    assert_eq!(snapshot.conversation_id, Some(id));
    let messages = snapshot.data.get("messages").and_then(|v| v.as_array()).unwrap();
    assert_eq!(messages[0]["body"], "one");
    assert_eq!(messages[1]["body"], "two");
}

#[tokio::test]
async fn subscribe_to_empty_conversation_yields_empty_snapshot() {
    let state = test_app_state();
    let id = seed_conversation(&state, &["a@x.com", "b@x.com"]).await;
    let (tx, _rx) = tokio::sync::mpsc::channel(8);

    let snapshot = subscribe(&state, id, Uuid::new_v4(), &subscribe_request(id), tx)
        .await
        .unwrap();
    let messages = snapshot.data.get("messages").and_then(|v| v.as_array()).unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn resubscribe_replaces_previous_subscription() {
    let state = test_app_state();
    let id = seed_conversation(&state, &["a@x.com"]).await;
    let client_id = Uuid::new_v4();
    let (tx, _rx) = tokio::sync::mpsc::channel(8);

    subscribe(&state, id, client_id, &subscribe_request(id), tx.clone())
        .await
        .unwrap();
    subscribe(&state, id, client_id, &subscribe_request(id), tx)
        .await
        .unwrap();

    let conversations = state.conversations.read().await;
    assert_eq!(conversations.get(&id).unwrap().subscribers.len(), 1);
}

#[tokio::test]
async fn unsubscribe_returns_original_request() {
    let state = test_app_state();
    let id = seed_conversation(&state, &["a@x.com"]).await;
    let client_id = Uuid::new_v4();
    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    let request = subscribe_request(id);
    subscribe(&state, id, client_id, &request, tx).await.unwrap();

    let removed = unsubscribe(&state, id, client_id).await.unwrap();
    assert_eq!(removed.id, request.id);
    assert!(unsubscribe(&state, id, client_id).await.is_none());
}

#[tokio::test]
async fn unsubscribe_all_removes_every_subscription_of_client() {
    let state = test_app_state();
    let first = seed_conversation(&state, &["a@x.com"]).await;
    let second = seed_conversation(&state, &["a@x.com"]).await;
    let client_id = Uuid::new_v4();
    let other_client = Uuid::new_v4();
    let (tx, _rx) = tokio::sync::mpsc::channel(8);

    subscribe(&state, first, client_id, &subscribe_request(first), tx.clone())
        .await
        .unwrap();
    subscribe(&state, second, client_id, &subscribe_request(second), tx.clone())
        .await
        .unwrap();
    subscribe(&state, second, other_client, &subscribe_request(second), tx)
        .await
        .unwrap();

    unsubscribe_all(&state, client_id).await;

    let conversations = state.conversations.read().await;
    assert!(conversations.get(&first).unwrap().subscribers.is_empty());
    let remaining = &conversations.get(&second).unwrap().subscribers;
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains_key(&other_client));
}

#[tokio::test]
async fn broadcast_with_full_queue_drops_snapshot_without_blocking() {
    let state = test_app_state();
    let id = seed_conversation(&state, &["a@x.com"]).await;
    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    subscribe(&state, id, Uuid::new_v4(), &subscribe_request(id), tx)
        .await
        .unwrap();

    {
        let conversations = state.conversations.read().await;
        let cs = conversations.get(&id).unwrap();
        broadcast_snapshot(cs);
        broadcast_snapshot(cs);
    }

    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}
