//! WebSocket handler: bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → decode + dispatch by syscall prefix
//! - Live feed snapshots and profile updates → forward to client
//!
//! Handler functions are pure business logic; they validate, call the
//! services, and return an `Outcome`. The dispatch layer owns replying.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id` and `email`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch turns the Outcome into reply frames
//! 4. Close → drop every subscription and watch of this client

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, Status};
use crate::services;
use crate::services::message::{MessageError, NewMessage};
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. Handlers never send frames directly.
enum Outcome {
    /// Send one item; the request stays open and later items arrive through
    /// the connection channel.
    Stream(Frame),
    /// Send done+data to sender.
    Reply(Data),
    /// Send empty done to sender.
    Done,
    /// Terminate an earlier long-running request, then finish this one.
    Close(Frame),
}

/// Per-connection identity and outbound channel.
pub(crate) struct Connection {
    pub(crate) client_id: Uuid,
    pub(crate) email: String,
    pub(crate) tx: mpsc::Sender<Frame>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let email = match services::session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(email)) => email,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            error!(error = %e, "ws ticket validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, email))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, email: String) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for feed snapshots and profile updates.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.subscriber_queue_capacity);
    let conn = Connection { client_id, email, tx: client_tx };

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("email", conn.email.clone());
    if socket.send_frame(&welcome).await.is_err() {
        return;
    }

    info!(%client_id, email = %conn.email, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Binary(bytes) => {
                        let replies = process_inbound_bytes(&state, &conn, &bytes).await;
                        if send_all(&mut socket, &replies).await.is_err() {
                            break;
                        }
                    }
                    Message::Text(_) => {
                        warn!(%client_id, "ws: text frames are not supported");
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if socket.send_frame(&frame).await.is_err() {
                    break;
                }
            }
        }
    }

    services::feed::unsubscribe_all(&state, client_id).await;
    services::presence::unwatch_all(&state, client_id).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode and process one inbound binary frame and return frames for the sender.
///
/// Transport concerns stay in `run_ws`, so tests can exercise dispatch
/// without a socket.
pub(crate) async fn process_inbound_bytes(state: &AppState, conn: &Connection, bytes: &[u8]) -> Vec<Frame> {
    let wire = match frames::decode_frame(bytes) {
        Ok(wire) => wire,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            return vec![gateway_error(format!("invalid frame: {e}"))];
        }
    };
    let mut req = match Frame::try_from(wire) {
        Ok(req) => req,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            return vec![gateway_error(e.to_string())];
        }
    };
    if req.status != Status::Request {
        warn!(client_id = %conn.client_id, syscall = %req.syscall, status = ?req.status, "ws: ignoring non-request frame");
        return Vec::new();
    }

    // Stamp the authenticated handle as `from`; never trust the client's.
    req.from = Some(conn.email.clone());
    info!(client_id = %conn.client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match req.prefix() {
        "chat" => handle_chat(state, conn, &req).await,
        "message" => handle_message(state, conn, &req).await,
        "user" => handle_user(state, conn, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Stream(item)) => vec![item],
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Ok(Outcome::Close(original)) => vec![original.done(), req.done()],
        Err(err_frame) => vec![err_frame],
    }
}

fn gateway_error(message: String) -> Frame {
    Frame::request("gateway:error", Data::new()).with_data("message", message)
}

// =============================================================================
// CHAT HANDLERS
// =============================================================================

async fn handle_chat(state: &AppState, conn: &Connection, req: &Frame) -> Result<Outcome, Frame> {
    let Some(conversation_id) = req.target_conversation() else {
        return Err(req.error("conversation_id required"));
    };

    match req.op() {
        "subscribe" => {
            match services::feed::subscribe(state, conversation_id, conn.client_id, req, conn.tx.clone()).await {
                Ok(snapshot) => Ok(Outcome::Stream(snapshot)),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "unsubscribe" => match services::feed::unsubscribe(state, conversation_id, conn.client_id).await {
            Some(original) => Ok(Outcome::Close(original)),
            None => Ok(Outcome::Done),
        },
        op => Err(req.error(format!("unknown chat op: {op}"))),
    }
}

// =============================================================================
// MESSAGE HANDLERS
// =============================================================================

async fn handle_message(state: &AppState, conn: &Connection, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "add" => {
            let Some(conversation_id) = req.target_conversation() else {
                return Err(req.error("conversation_id required"));
            };
            let raw_id = req.data_str("id").unwrap_or_default();
            let Ok(id) = Uuid::parse_str(raw_id) else {
                return Err(req.error_from(&MessageError::InvalidId(raw_id.to_owned())));
            };
            let new = NewMessage {
                id,
                conversation_id,
                body: req.data_str("body").unwrap_or_default().to_owned(),
                avatar_url: req
                    .data_str("avatar_url")
                    .filter(|url| !url.is_empty())
                    .map(str::to_owned),
            };

            match services::message::append_message(state, &conn.email, new).await {
                Ok(appended) => {
                    let mut data = Data::new();
                    data.insert("message".into(), serde_json::to_value(appended.record()).unwrap_or_default());
                    Ok(Outcome::Reply(data))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown message op: {op}"))),
    }
}

// =============================================================================
// USER HANDLERS
// =============================================================================

async fn handle_user(state: &AppState, conn: &Connection, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "touch" => match services::presence::touch_presence(state, &conn.email).await {
            Ok(profile) => {
                let mut data = Data::new();
                data.insert("profile".into(), serde_json::to_value(&profile).unwrap_or_default());
                Ok(Outcome::Reply(data))
            }
            Err(e) => Err(req.error_from(&e)),
        },
        "watch" => {
            let email = watched_email(req);
            match services::presence::watch(state, &email, conn.client_id, req, conn.tx.clone()).await {
                Ok(item) => Ok(Outcome::Stream(item)),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "unwatch" => match services::presence::unwatch(state, &watched_email(req), conn.client_id).await {
            Some(original) => Ok(Outcome::Close(original)),
            None => Ok(Outcome::Done),
        },
        op => Err(req.error(format!("unknown user op: {op}"))),
    }
}

fn watched_email(req: &Frame) -> String {
    req.data_str("email")
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

// =============================================================================
// HELPERS
// =============================================================================

/// Outbound half of a connection. A failed send means the peer is gone.
trait FrameSink {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), ()>;
}

impl FrameSink for WebSocket {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), ()> {
        log_outbound(frame);
        let bytes = frames::encode_frame(&frames::Frame::from(frame));
        self.send(Message::Binary(bytes.into()))
            .await
            .map_err(|_| ())
    }
}

/// Send replies in order, stopping at the first failure.
async fn send_all(sink: &mut impl FrameSink, replies: &[Frame]) -> Result<(), ()> {
    for frame in replies {
        sink.send_frame(frame).await?;
    }
    Ok(())
}

fn log_outbound(frame: &Frame) {
    if frame.status == Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
