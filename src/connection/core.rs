use super::{
    ChannelEndpoint, CloseCause, ConnectionCallbacks, ConnectionManager, ConnectionState, TaskFault,
};
use crate::auth::CredentialProvider;
use crate::infrastructure::{HeartbeatManager, ScheduledTask};
use crate::messaging::MessageRouter;
use crate::types::constants::{
    DASHBOARD_KEEPALIVE, HEARTBEAT_INTERVAL, TASK_KEEPALIVE, TERMINAL_CLOSE_GRACE, WRITE_TIMEOUT,
};
use crate::types::{Envelope, PushMessage, Result, SessionError};
use crate::websocket::{SocketConnector, SocketStream, redact};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;

/// Per-channel tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub heartbeat_interval: Duration,
    /// Raw text frame sent on every heartbeat tick
    pub keepalive: String,
    /// How long a channel stays open after a terminal message
    pub close_grace: Duration,
    /// Whether `completed`/`error` end the channel (task channels only)
    pub close_on_terminal: bool,
    /// Bound on each outbound frame and on the close handshake
    pub write_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(HEARTBEAT_INTERVAL),
            keepalive: TASK_KEEPALIVE.to_string(),
            close_grace: Duration::from_millis(TERMINAL_CLOSE_GRACE),
            close_on_terminal: true,
            write_timeout: Duration::from_millis(WRITE_TIMEOUT),
        }
    }
}

impl ConnectionOptions {
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_keepalive(mut self, payload: impl Into<String>) -> Self {
        self.keepalive = payload.into();
        self
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Long-lived channel: JSON keep-alive, never closes on `error`
    pub fn dashboard() -> Self {
        Self {
            keepalive: DASHBOARD_KEEPALIVE.to_string(),
            close_on_terminal: false,
            ..Self::default()
        }
    }
}

/// One long-lived push channel.
///
/// `Idle -> Connecting -> Open -> Closed`. While open it sends a keep-alive
/// frame on a fixed interval and dispatches every inbound message to its
/// callbacks. Unless the options say otherwise, a `completed`/`error` message
/// closes the channel after a short grace period. Any other close is
/// reported as lost through `on_error` and `on_disconnected`; reconnecting
/// is up to the owner.
///
/// Dropping the handle tears the channel down without a close handshake.
pub struct HeartbeatConnection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    key: String,
    manager: Arc<ConnectionManager>,
    router: MessageRouter,
    heartbeat: Mutex<Option<ScheduledTask>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    shutdown: Notify,
    finished: AtomicBool,
}

impl HeartbeatConnection {
    /// Starts connecting in the background and returns immediately.
    ///
    /// Fails fast with `MissingCredential`, without touching the network, if
    /// the endpoint needs a token and none is available. Must be called from
    /// within a Tokio runtime.
    pub fn open(
        endpoint: &dyn ChannelEndpoint,
        credentials: &dyn CredentialProvider,
        connector: Arc<dyn SocketConnector>,
        callbacks: ConnectionCallbacks,
        options: ConnectionOptions,
    ) -> Result<Self> {
        let token = credentials.access_token();
        if endpoint.requires_token() && token.is_none() {
            tracing::warn!("[{}] No access token, not connecting", endpoint.key());
            return Err(SessionError::MissingCredential);
        }
        let url = endpoint.url(token.as_deref())?;

        let key = endpoint.key().to_string();
        let inner = Arc::new(ConnectionInner {
            router: MessageRouter::new(key.clone(), callbacks),
            key,
            manager: Arc::new(ConnectionManager::new().with_write_timeout(options.write_timeout)),
            heartbeat: Mutex::new(None),
            driver: Mutex::new(None),
            shutdown: Notify::new(),
            finished: AtomicBool::new(false),
        });

        inner.manager.set_state(ConnectionState::Connecting);
        tracing::info!("[{}] Connecting to {}", inner.key, redact(&url));

        let handle = tokio::spawn(drive(Arc::clone(&inner), connector, url, options));
        *lock(&inner.driver) = Some(handle);

        Ok(Self { inner })
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.manager.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.manager.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.manager.is_connected()
    }

    /// True once the close event has been delivered
    pub fn is_closed(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }

    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.inner.manager.send_text(text).await
    }

    pub async fn send_message(&self, message: &Envelope) -> Result<()> {
        self.inner.manager.send_message(message).await
    }

    /// Closes the channel and waits for the close event to be delivered.
    /// Idempotent.
    ///
    /// Must not be awaited from inside one of this channel's own callbacks.
    pub async fn close(&self) {
        self.inner.stop_heartbeat();
        self.inner.shutdown.notify_one();

        let driver = lock(&self.inner.driver).take();
        if let Some(handle) = driver
            && let Err(e) = handle.await
            && e.is_panic()
        {
            tracing::error!("[{}] Connection driver panicked", self.inner.key);
        }

        // No-op unless the driver never got to run
        self.inner.finish(CloseCause::Requested);
    }

    /// Synchronous teardown: no close handshake, close event delivered inline
    pub fn abort(&self) {
        self.inner.stop_heartbeat();
        if let Some(handle) = lock(&self.inner.driver).take() {
            handle.abort();
        }
        self.inner.manager.clear_writer();
        self.inner.finish(CloseCause::Requested);
    }
}

impl Drop for HeartbeatConnection {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.abort();
        }
    }
}

impl std::fmt::Debug for HeartbeatConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatConnection")
            .field("key", &self.inner.key)
            .field("state", &self.state())
            .finish()
    }
}

async fn drive(
    inner: Arc<ConnectionInner>,
    connector: Arc<dyn SocketConnector>,
    url: String,
    options: ConnectionOptions,
) {
    let connected = tokio::select! {
        biased;
        _ = inner.shutdown.notified() => None,
        result = connector.connect(&url) => Some(result),
    };

    let (sink, mut stream) = match connected {
        Some(Ok(pair)) => pair,
        Some(Err(e)) => {
            tracing::warn!("[{}] Failed to connect: {}", inner.key, e);
            inner.finish(CloseCause::Lost(e.to_string()));
            return;
        }
        None => {
            inner.finish(CloseCause::Requested);
            return;
        }
    };

    inner.manager.set_writer(sink).await;
    inner.manager.set_state(ConnectionState::Open);
    tracing::info!("[{}] Connected", inner.key);

    inner.start_heartbeat(&options);
    inner.router.callbacks().connected();

    let cause = inner.read_loop(&mut stream, &options).await;

    // Heartbeat goes first so nothing is written to a closing socket
    inner.stop_heartbeat();
    if let Err(e) = inner.manager.close().await {
        tracing::debug!("[{}] Close handshake failed: {}", inner.key, e);
    }
    inner.finish(cause);
}

impl ConnectionInner {
    async fn read_loop(&self, stream: &mut SocketStream, options: &ConnectionOptions) -> CloseCause {
        let mut grace_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return CloseCause::Requested,
                _ = wait_until(grace_deadline) => {
                    tracing::debug!("[{}] Grace period over, closing", self.key);
                    return CloseCause::Completed;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(message) = self.handle_text(&text)
                            && message.is_terminal()
                            && options.close_on_terminal
                            && grace_deadline.is_none()
                        {
                            grace_deadline = Some(Instant::now() + options.close_grace);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        match frame {
                            Some(frame) => tracing::info!(
                                "[{}] Server closed connection: code={}, reason='{}'",
                                self.key, frame.code, frame.reason
                            ),
                            None => tracing::info!("[{}] Server closed connection", self.key),
                        }
                        return self.unexpected_close(grace_deadline, "closed by server");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        tracing::debug!("[{}] Received ping ({} bytes)", self.key, data.len());
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Binary(data))) => {
                        tracing::warn!("[{}] Ignoring binary frame ({} bytes)", self.key, data.len());
                    }
                    Some(Err(e)) => {
                        tracing::warn!("[{}] Read error: {}", self.key, e);
                        return self.unexpected_close(grace_deadline, &e.to_string());
                    }
                    None => return self.unexpected_close(grace_deadline, "stream ended"),
                }
            }
        }
    }

    /// Parses and dispatches one text frame. Malformed frames are dropped.
    fn handle_text(&self, text: &str) -> Option<PushMessage> {
        if text == "pong" {
            self.router.route(&PushMessage::Pong);
            return Some(PushMessage::Pong);
        }

        match PushMessage::parse(text) {
            Ok(message) => {
                tracing::debug!("[{}] Received {}", self.key, message.kind());
                self.router.route(&message);
                Some(message)
            }
            Err(e) => {
                tracing::warn!("[{}] Dropping message: {}", self.key, e);
                None
            }
        }
    }

    /// A close after a terminal message is the expected end, not a loss
    fn unexpected_close(&self, grace_deadline: Option<Instant>, reason: &str) -> CloseCause {
        if grace_deadline.is_some() {
            CloseCause::Completed
        } else {
            CloseCause::Lost(reason.to_string())
        }
    }

    fn start_heartbeat(&self, options: &ConnectionOptions) {
        let task = HeartbeatManager::new(Arc::downgrade(&self.manager))
            .with_interval(options.heartbeat_interval)
            .with_payload(options.keepalive.clone())
            .spawn();
        *lock(&self.heartbeat) = Some(task);
    }

    fn stop_heartbeat(&self) {
        if let Some(mut task) = lock(&self.heartbeat).take() {
            task.cancel();
        }
    }

    /// Delivers the close event. Only the first call has any effect.
    fn finish(&self, cause: CloseCause) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }

        self.stop_heartbeat();
        self.manager.set_state(ConnectionState::Closed);

        match &cause {
            CloseCause::Lost(reason) => {
                tracing::warn!("[{}] Connection lost: {}", self.key, reason);
                self.router
                    .callbacks()
                    .error(&TaskFault::ConnectionLost(reason.clone()));
            }
            CloseCause::Completed => tracing::info!("[{}] Channel finished", self.key),
            CloseCause::Requested => tracing::debug!("[{}] Channel closed", self.key),
        }

        self.router.callbacks().disconnected(&cause);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
