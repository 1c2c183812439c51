//! WebSocket frame client for real-time communication with the server.
//!
//! The frame client manages the WebSocket lifecycle: ticket, connection,
//! reconnection with exponential backoff, and frame dispatch into the
//! Leptos state signals. It is the bridge between the server's frame
//! protocol and the conversation screen.
//!
//! All WebSocket logic is gated behind `#[cfg(feature = "hydrate")]` since it
//! requires a browser environment.
//!
//! ERROR HANDLING
//! ==============
//! Parse/transport failures are logged and absorbed; the reconnect loop and
//! the next snapshot bring the screen back in step.

#[cfg(any(test, feature = "hydrate"))]
#[path = "frame_client_parse.rs"]
mod frame_client_parse;

#[cfg(feature = "hydrate")]
use self::frame_client_parse::{frame_conversation_id, frame_error_message, parse_snapshot, parse_watched_profile};
#[cfg(feature = "hydrate")]
use crate::net::types::{Frame, FrameStatus};
#[cfg(feature = "hydrate")]
use crate::state::chat::ChatState;
#[cfg(feature = "hydrate")]
use crate::state::connection::{ConnectionState, ConnectionStatus};
#[cfg(feature = "hydrate")]
use leptos::prelude::{RwSignal, Update, WithUntracked};

/// Send a frame to the server via the shared sender channel.
///
/// Returns `false` if the channel is closed (no active connection).
#[cfg(feature = "hydrate")]
pub fn send_frame(tx: &futures::channel::mpsc::UnboundedSender<Vec<u8>>, frame: &crate::net::types::Frame) -> bool {
    tx.unbounded_send(frames::encode_frame(frame)).is_ok()
}

/// Spawn the WebSocket frame client lifecycle as a local async task.
///
/// This connects to the server, handles incoming frames, and reconnects
/// on disconnect with exponential backoff.
#[cfg(feature = "hydrate")]
pub fn spawn_frame_client(
    connection: RwSignal<ConnectionState>,
    chat: RwSignal<ChatState>,
) -> futures::channel::mpsc::UnboundedSender<Vec<u8>> {
    use futures::channel::mpsc;

    let (tx, rx) = mpsc::unbounded::<Vec<u8>>();
    leptos::task::spawn_local(frame_client_loop(connection, chat, rx));
    tx
}

/// Main connection loop with reconnect logic.
#[cfg(feature = "hydrate")]
async fn frame_client_loop(
    connection: RwSignal<ConnectionState>,
    chat: RwSignal<ChatState>,
    rx: futures::channel::mpsc::UnboundedReceiver<Vec<u8>>,
) {
    use std::cell::RefCell;
    use std::rc::Rc;

    let rx = Rc::new(RefCell::new(rx));
    let mut backoff_ms: u32 = 1000;
    let max_backoff_ms: u32 = 10_000;

    loop {
        connection.update(|c| c.status = ConnectionStatus::Connecting);

        let ticket = match crate::net::api::create_ws_ticket().await {
            Ok(t) => t,
            Err(e) => {
                leptos::logging::warn!("WS ticket failed: {e}");
                connection.update(|c| c.status = ConnectionStatus::Disconnected);
                gloo_timers::future::sleep(std::time::Duration::from_millis(u64::from(backoff_ms))).await;
                backoff_ms = (backoff_ms * 2).min(max_backoff_ms);
                continue;
            }
        };

        let location = web_sys::window().map(|w| w.location());
        let secure = location
            .as_ref()
            .and_then(|l| l.protocol().ok())
            .is_some_and(|p| p == "https:");
        let host = location
            .as_ref()
            .and_then(|l| l.host().ok())
            .unwrap_or_else(|| "localhost:3000".to_owned());
        let ws_proto = if secure { "wss" } else { "ws" };
        let ws_url = format!("{ws_proto}://{host}/api/ws?ticket={ticket}");

        match connect_and_run(&ws_url, connection, chat, &rx).await {
            Ok(()) => {
                leptos::logging::log!("WS disconnected cleanly");
                backoff_ms = 1000;
            }
            Err(e) => {
                leptos::logging::warn!("WS error: {e}");
            }
        }

        connection.update(|c| {
            c.status = ConnectionStatus::Disconnected;
            c.client_id = None;
        });

        gloo_timers::future::sleep(std::time::Duration::from_millis(u64::from(backoff_ms))).await;
        backoff_ms = (backoff_ms * 2).min(max_backoff_ms);
    }
}

/// Connect to the WebSocket and process messages until disconnect.
#[cfg(feature = "hydrate")]
async fn connect_and_run(
    url: &str,
    connection: RwSignal<ConnectionState>,
    chat: RwSignal<ChatState>,
    rx: &std::rc::Rc<std::cell::RefCell<futures::channel::mpsc::UnboundedReceiver<Vec<u8>>>>,
) -> Result<(), String> {
    use futures::StreamExt;
    use gloo_net::websocket::Message;
    use gloo_net::websocket::futures::WebSocket;

    let ws = WebSocket::open(url).map_err(|e| e.to_string())?;
    let (mut ws_write, mut ws_read) = ws.split();

    let mut rx_borrow = rx.borrow_mut();
    let send_task = async {
        use futures::SinkExt;
        while let Some(msg) = rx_borrow.next().await {
            if ws_write.send(Message::Bytes(msg)).await.is_err() {
                break;
            }
        }
    };

    let recv_task = async {
        while let Some(msg) = ws_read.next().await {
            match msg {
                Ok(Message::Bytes(bytes)) => match frames::decode_frame(&bytes) {
                    Ok(frame) => dispatch_frame(&frame, connection, chat),
                    Err(e) => leptos::logging::warn!("WS undecodable frame: {e}"),
                },
                Ok(Message::Text(_)) => {}
                Err(e) => {
                    leptos::logging::warn!("WS recv error: {e}");
                    break;
                }
            }
        }
    };

    futures::future::select(Box::pin(send_task), Box::pin(recv_task)).await;
    Ok(())
}

/// Dispatch an incoming frame to the appropriate state handler.
#[cfg(feature = "hydrate")]
fn dispatch_frame(frame: &Frame, connection: RwSignal<ConnectionState>, chat: RwSignal<ChatState>) {
    match (frame.syscall.as_str(), frame.status) {
        ("session:connected", _) => {
            connection.update(|c| {
                c.status = ConnectionStatus::Connected;
                c.client_id = frame
                    .data
                    .get("client_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned);
            });
        }
        ("chat:subscribe", FrameStatus::Item) => {
            let ours = chat.with_untracked(|c| frame_conversation_id(frame) == Some(c.conversation_id()));
            if !ours {
                return;
            }
            match parse_snapshot(&frame.data) {
                Some(records) => chat.maybe_update(|c| c.apply_live_snapshot(records)),
                None => leptos::logging::warn!("unreadable chat snapshot: {}", frame.data),
            }
        }
        ("user:watch", FrameStatus::Item) => {
            if let Some((email, profile)) = parse_watched_profile(&frame.data) {
                chat.maybe_update(|c| c.apply_profile(&email, profile));
            }
        }
        ("gateway:error", _) => {
            leptos::logging::warn!("gateway:error frame: {}", frame.data);
        }
        (_, FrameStatus::Done | FrameStatus::Error) => {
            let mut consumed = false;
            chat.maybe_update(|c| {
                consumed = c.apply_write_reply(frame);
                consumed
            });
            if !consumed && frame.status == FrameStatus::Error {
                leptos::logging::warn!("{} failed: {}", frame.syscall, frame_error_message(frame));
            }
        }
        _ => {}
    }
}
