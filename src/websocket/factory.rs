use crate::types::Result;
use async_trait::async_trait;
use futures::{Sink, Stream, StreamExt};
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Write half of an open socket
pub type SocketSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Read half of an open socket
pub type SocketStream = Pin<Box<dyn Stream<Item = std::result::Result<Message, WsError>> + Send>>;

/// Opens push channel sockets.
///
/// Connections only see this trait, so they can be driven by in-memory
/// sockets as well as real ones.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<(SocketSink, SocketStream)>;
}

/// WebSocket factory for creating WebSocket connections
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

impl WebSocketFactory {
    /// Create a new WebSocket connection
    pub async fn create(url: &str) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        tracing::debug!("Creating WebSocket connection to: {}", redact(url));
        let (stream, response) = connect_async(url).await?;
        tracing::debug!("WebSocket handshake completed: {}", response.status());
        Ok(stream)
    }
}

#[async_trait]
impl SocketConnector for WebSocketFactory {
    async fn connect(&self, url: &str) -> Result<(SocketSink, SocketStream)> {
        let stream = Self::create(url).await?;
        let (write_half, read_half) = stream.split();
        Ok((Box::pin(write_half), Box::pin(read_half)))
    }
}

/// Strips the query string so tokens never reach the logs
pub fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
