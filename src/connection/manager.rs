use super::ConnectionState;
use crate::types::constants::WRITE_TIMEOUT;
use crate::types::{Envelope, Result, SessionError};
use crate::websocket::SocketSink;
use futures::SinkExt;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

/// Owns the write half of a socket and the channel's lifecycle state.
///
/// Every write and the close handshake are bounded by `write_timeout`, so a
/// peer that stops reading cannot hold the writer forever.
pub struct ConnectionManager {
    ws_write: Mutex<Option<SocketSink>>,
    state: watch::Sender<ConnectionState>,
    write_timeout: Duration,
}

impl ConnectionManager {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            ws_write: Mutex::new(None),
            state,
            write_timeout: Duration::from_millis(WRITE_TIMEOUT),
        }
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the WebSocket write sink (called after successful connection)
    pub async fn set_writer(&self, writer: SocketSink) {
        let mut ws = self.ws_write.lock().await;
        *ws = Some(writer);
    }

    /// Gets the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Sets the connection state and notifies watchers
    pub fn set_state(&self, new_state: ConnectionState) {
        let previous = self.state.send_replace(new_state);
        if previous != new_state {
            tracing::debug!("Connection state {:?} -> {:?}", previous, new_state);
        }
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Checks if currently connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Sends a raw text frame
    pub async fn send_text(&self, text: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let write = async {
            let mut ws_guard = self.ws_write.lock().await;
            match ws_guard.as_mut() {
                Some(ws) => ws
                    .send(Message::text(text.to_string()))
                    .await
                    .map_err(SessionError::from),
                None => Err(SessionError::NotConnected),
            }
        };

        time::timeout(self.write_timeout, write)
            .await
            .map_err(|_| SessionError::Timeout)?
    }

    /// Sends a structured message
    pub async fn send_message(&self, message: &Envelope) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.send_text(&json).await
    }

    /// Closes the WebSocket connection gracefully. A handshake that does not
    /// finish within the write timeout is abandoned and the writer dropped.
    pub async fn close(&self) -> Result<()> {
        if self.state() == ConnectionState::Closed {
            return Ok(());
        }
        self.set_state(ConnectionState::Closing);

        let handshake = async {
            let writer = self.ws_write.lock().await.take();
            match writer {
                Some(mut ws) => ws.close().await.map_err(SessionError::from),
                None => Ok(()),
            }
        };

        let result = match time::timeout(self.write_timeout, handshake).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "Close handshake did not finish within {:?}, dropping socket",
                    self.write_timeout
                );
                self.clear_writer();
                Err(SessionError::Timeout)
            }
        };

        self.set_state(ConnectionState::Closed);
        result
    }

    /// Drops the writer without a close handshake (used by synchronous teardown)
    pub fn clear_writer(&self) {
        if let Ok(mut ws) = self.ws_write.try_lock() {
            *ws = None;
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
