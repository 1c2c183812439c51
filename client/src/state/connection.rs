//! Websocket connection status shared by the frame client and views.

/// Lifecycle of the realtime connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Clone, Debug, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// Server-assigned id from `session:connected`.
    pub client_id: Option<String>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}
