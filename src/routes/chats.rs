//! Conversation REST routes: loader payload, listing, creation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::frame::ErrorCode;
use crate::services::conversation::{self, ChatMeta, ConversationError};
use crate::services::message::{self, MessageError};
use crate::state::AppState;

pub(crate) fn conversation_error_status(err: &ConversationError) -> StatusCode {
    match err {
        ConversationError::NotFound(_) => StatusCode::NOT_FOUND,
        ConversationError::InvalidRecipient(_) | ConversationError::SelfConversation => StatusCode::BAD_REQUEST,
        ConversationError::AlreadyExists(_) => StatusCode::CONFLICT,
        ConversationError::Encode(_) | ConversationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &ConversationError) -> Response {
    let status = conversation_error_status(err);
    if status.is_server_error() {
        error!(error = %err, "conversation request failed");
    }
    let mut body = serde_json::json!({ "code": err.error_code(), "message": err.to_string() });
    if let ConversationError::AlreadyExists(id) = err {
        body["id"] = serde_json::json!(id);
    }
    (status, Json(body)).into_response()
}

/// `GET /api/chats/{id}`: Conversation Loader payload.
pub async fn get_chat(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match conversation::load_conversation(&state, id).await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/chats`: conversations of the signed-in user.
pub async fn list_chats(State(state): State<AppState>, auth: AuthUser) -> Response {
    match conversation::list_conversations(&state, &auth.user.email).await {
        Ok(chats) => Json(chats).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/chats/{id}/meta`: one-shot conversation document read.
pub async fn get_chat_meta(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match conversation::get_conversation(&state, id).await {
        Ok(Some(found)) => Json(ChatMeta::from(&found)).into_response(),
        Ok(None) => error_response(&ConversationError::NotFound(id)),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/chats/{id}/messages`: one-shot ordered message read.
pub async fn list_chat_messages(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match message::list_messages(&state, id).await {
        Ok(records) => Json(records).into_response(),
        Err(MessageError::ConversationNotFound(_)) => error_response(&ConversationError::NotFound(id)),
        Err(e) => {
            error!(error = %e, conversation_id = %id, "message list failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "code": e.error_code(), "message": e.to_string() })))
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct CreateChatBody {
    recipient: String,
}

/// `POST /api/chats`: start a conversation with `recipient`.
pub async fn create_chat(State(state): State<AppState>, auth: AuthUser, Json(body): Json<CreateChatBody>) -> Response {
    match conversation::create_conversation(&state, &auth.user.email, &body.recipient).await {
        Ok(chat) => (StatusCode::CREATED, Json(chat)).into_response(),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(conversation_error_status(&ConversationError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(conversation_error_status(&ConversationError::SelfConversation), StatusCode::BAD_REQUEST);
        assert_eq!(conversation_error_status(&ConversationError::AlreadyExists(Uuid::nil())), StatusCode::CONFLICT);
        assert_eq!(
            conversation_error_status(&ConversationError::Database(sqlx::Error::PoolTimedOut)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn get_chat_returns_loader_payload() {
        let state = crate::state::test_helpers::test_app_state();
        let id = crate::state::test_helpers::seed_conversation(&state, &["a@x.com", "b@x.com"]).await;
        let response = get_chat(State(state), Path(id)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_chat_messages_returns_ordered_records() {
        let state = crate::state::test_helpers::test_app_state();
        let id = crate::state::test_helpers::seed_conversation_with_messages(
            &state,
            &["a@x.com", "b@x.com"],
            vec![crate::state::test_helpers::dummy_message("a@x.com", "hi", 1, 1)],
        )
        .await;
        let response = list_chat_messages(State(state), Path(id)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_chat_meta_for_resident_conversation() {
        let state = crate::state::test_helpers::test_app_state();
        let id = crate::state::test_helpers::seed_conversation(&state, &["a@x.com", "b@x.com"]).await;
        let response = get_chat_meta(State(state), Path(id)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn conflict_body_carries_existing_id() {
        let id = Uuid::new_v4();
        let response = error_response(&ConversationError::AlreadyExists(id));
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
