//! In-memory fakes for sockets, HTTP and the UI

use crate::auth::{AuthSignal, CredentialProvider};
use crate::infrastructure::{ApiRequest, ApiResponse, HttpTransport};
use crate::types::{Result, SessionError};
use crate::ui::{NoticeLevel, UiBridge};
use crate::websocket::{SocketConnector, SocketSink, SocketStream};
use async_trait::async_trait;
use serde_json::Value;
use futures::Sink;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Hands out in-memory sockets; the server side of each is picked up with `accept`
pub(crate) struct MockConnector {
    accepted: mpsc::UnboundedSender<MockSocket>,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockSocket>>,
    urls: Mutex<Vec<String>>,
    refusals: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        let (accepted, incoming) = mpsc::unbounded_channel();
        Arc::new(Self {
            accepted,
            incoming: tokio::sync::Mutex::new(incoming),
            urls: Mutex::new(Vec::new()),
            refusals: AtomicUsize::new(0),
        })
    }

    /// The next `count` connects fail with a network error
    pub fn refuse_next(&self, count: usize) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Connect attempts so far, refused ones included
    pub fn connects(&self) -> usize {
        self.urls.lock().unwrap().len()
    }

    pub async fn accept(&self) -> MockSocket {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .expect("connector dropped")
    }
}

#[async_trait]
impl SocketConnector for MockConnector {
    async fn connect(&self, url: &str) -> Result<(SocketSink, SocketStream)> {
        self.urls.lock().unwrap().push(url.to_string());

        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(SessionError::Network("connection refused".into()));
        }

        let (to_server, from_client) = mpsc::unbounded_channel::<Message>();
        let (to_client, from_server) =
            mpsc::unbounded_channel::<std::result::Result<Message, WsError>>();

        let sink = futures::sink::unfold(to_server, |tx, message: Message| async move {
            tx.send(message).map_err(|_| WsError::ConnectionClosed)?;
            Ok::<_, WsError>(tx)
        });
        let stream = futures::stream::unfold(from_server, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        let _ = self.accepted.send(MockSocket {
            to_client,
            from_client,
        });
        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// Connects to a peer that never reads: writes and the close handshake
/// stay pending forever and nothing ever arrives
#[derive(Default)]
pub(crate) struct StalledConnector {
    connects: AtomicUsize,
}

impl StalledConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocketConnector for StalledConnector {
    async fn connect(&self, _url: &str) -> Result<(SocketSink, SocketStream)> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok((Box::pin(StalledSink), Box::pin(futures::stream::pending())))
    }
}

struct StalledSink;

impl Sink<Message> for StalledSink {
    type Error = WsError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
        Poll::Pending
    }

    fn start_send(self: Pin<&mut Self>, _item: Message) -> std::result::Result<(), WsError> {
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
        Poll::Pending
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
        Poll::Pending
    }
}

/// Server end of an in-memory socket
pub(crate) struct MockSocket {
    to_client: mpsc::UnboundedSender<std::result::Result<Message, WsError>>,
    from_client: mpsc::UnboundedReceiver<Message>,
}

impl MockSocket {
    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.send(Ok(Message::text(text.to_string())));
    }

    pub fn send_json(&self, value: Value) {
        self.send_text(&value.to_string());
    }

    /// Server-initiated close frame
    pub fn close(&self) {
        let _ = self.to_client.send(Ok(Message::Close(None)));
    }

    /// Transport error on the read side
    pub fn fail(&self, reason: &str) {
        let _ = self
            .to_client
            .send(Err(WsError::Io(std::io::Error::other(reason.to_string()))));
    }

    /// Next text frame written by the client
    pub async fn recv_text(&mut self) -> Option<String> {
        while let Some(message) = self.from_client.recv().await {
            if let Message::Text(text) = message {
                return Some(text.to_string());
            }
        }
        None
    }

    pub fn try_recv_text(&mut self) -> Option<String> {
        while let Ok(message) = self.from_client.try_recv() {
            if let Message::Text(text) = message {
                return Some(text.to_string());
            }
        }
        None
    }

    /// Waits (up to a minute of virtual time) for the client to drop its write half
    pub async fn closed(&mut self) -> bool {
        tokio::time::timeout(Duration::from_secs(60), async {
            while self.from_client.recv().await.is_some() {}
        })
        .await
        .is_ok()
    }
}

/// Fixed credentials; signals are recorded
#[derive(Default)]
pub(crate) struct StaticCredentials {
    token: Mutex<Option<String>>,
    signals: Mutex<Vec<AuthSignal>>,
}

impl StaticCredentials {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
            signals: Mutex::new(Vec::new()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: Option<&str>) {
        *self.token.lock().unwrap() = token.map(str::to_string);
    }
}

impl CredentialProvider for StaticCredentials {
    fn access_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    fn refresh_token(&self) -> Option<String> {
        None
    }

    fn signal(&self, signal: AuthSignal) {
        self.signals.lock().unwrap().push(signal);
    }
}

pub(crate) struct RecordedCall {
    pub request: ApiRequest,
    pub bearer: Option<String>,
}

struct Scripted {
    delay: Option<Duration>,
    outcome: Result<ApiResponse>,
}

/// Answers requests from a queue, in order, and records what was sent
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, status: u16, body: Value) {
        self.push(None, Ok(ApiResponse::new(status, body)));
    }

    /// Response that only arrives after `delay` of (virtual) time
    pub fn push_delayed(&self, delay: Duration, status: u16, body: Value) {
        self.push(Some(delay), Ok(ApiResponse::new(status, body)));
    }

    pub fn push_error(&self, error: SessionError) {
        self.push(None, Err(error));
    }

    fn push(&self, delay: Option<Duration>, outcome: Result<ApiResponse>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted { delay, outcome });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| RecordedCall {
                request: call.request.clone(),
                bearer: call.bearer.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            request: request.clone(),
            bearer: bearer.map(str::to_string),
        });

        let next = self.script.lock().unwrap().pop_front();
        let Some(Scripted { delay, outcome }) = next else {
            return Err(SessionError::Network("no scripted response".into()));
        };

        if let Some(delay) = delay {
            match request.timeout {
                Some(timeout) if timeout < delay => {
                    tokio::time::sleep(timeout).await;
                    return Err(SessionError::Timeout);
                }
                _ => tokio::time::sleep(delay).await,
            }
        }
        outcome
    }
}

/// Records notices and navigations
#[derive(Default)]
pub(crate) struct RecordingUi {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
    routes: Mutex<Vec<String>>,
}

impl RecordingUi {
    pub fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl UiBridge for RecordingUi {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }

    fn navigate(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}
