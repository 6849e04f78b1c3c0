use super::DashboardSnapshot;
use crate::auth::{ApiClient, CredentialProvider};
use crate::connection::{
    CloseCause, ConnectionCallbacks, ConnectionOptions, DashboardEndpoint, HeartbeatConnection,
};
use crate::infrastructure::{ScheduledTask, TaskManager, Timer};
use crate::types::constants::{
    DASHBOARD_POLL_INTERVAL, DASHBOARD_RECONNECT_DELAY, endpoints, message_types,
};
use crate::types::{Envelope, PushMessage, Result, SessionError};
use crate::ui::{NoticeLevel, UiBridge};
use crate::websocket::SocketConnector;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// Where full snapshots come from
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<DashboardSnapshot>;
}

#[async_trait]
impl SnapshotSource for ApiClient {
    async fn fetch_snapshot(&self) -> Result<DashboardSnapshot> {
        self.get_json(endpoints::DASHBOARD_STATS).await
    }
}

#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Full refresh period while the channel is down
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub connection: ConnectionOptions,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DASHBOARD_POLL_INTERVAL),
            reconnect_delay: Duration::from_millis(DASHBOARD_RECONNECT_DELAY),
            connection: ConnectionOptions::dashboard(),
        }
    }
}

/// Live dashboard: one shared push channel plus a polling fallback.
///
/// Polling only refreshes while the channel is down. A closed channel is
/// reopened after a fixed delay for as long as the feed is mounted.
#[derive(Clone)]
pub struct DashboardFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    endpoint: DashboardEndpoint,
    source: Arc<dyn SnapshotSource>,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn SocketConnector>,
    ui: Arc<dyn UiBridge>,
    options: FeedOptions,
    snapshot: watch::Sender<DashboardSnapshot>,
    connected: watch::Sender<bool>,
    state: Mutex<FeedState>,
}

#[derive(Default)]
struct FeedState {
    mounted: bool,
    /// Bumped on every mount/unmount so stale callbacks are ignored
    epoch: u64,
    connection: Option<Arc<HeartbeatConnection>>,
    reconnect: Option<ScheduledTask>,
    poll: Option<ScheduledTask>,
    fetches: TaskManager,
    backoff: Option<Timer>,
}

impl DashboardFeed {
    pub fn new(
        endpoint: DashboardEndpoint,
        source: Arc<dyn SnapshotSource>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn SocketConnector>,
        ui: Arc<dyn UiBridge>,
        options: FeedOptions,
    ) -> Self {
        let (snapshot, _) = watch::channel(DashboardSnapshot::default());
        let (connected, _) = watch::channel(false);
        Self {
            inner: Arc::new(FeedInner {
                endpoint,
                source,
                credentials,
                connector,
                ui,
                options,
                snapshot,
                connected,
                state: Mutex::new(FeedState::default()),
            }),
        }
    }

    /// Fetches a full snapshot in the background, opens the channel and
    /// starts the polling fallback. No-op when already mounted.
    pub fn mount(&self) {
        let mut state = self.inner.state();
        if state.mounted {
            return;
        }
        state.mounted = true;
        state.epoch += 1;
        state.backoff = Some(Timer::fixed(self.inner.options.reconnect_delay));
        tracing::info!("Mounting dashboard feed");

        let weak = Arc::downgrade(&self.inner);
        state.fetches.spawn(async move {
            if let Some(inner) = weak.upgrade() {
                inner.load().await;
            }
        });

        FeedInner::open_channel(&self.inner, &mut state);

        let weak = Arc::downgrade(&self.inner);
        state.poll = Some(ScheduledTask::every(
            self.inner.options.poll_interval,
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade()
                        && !inner.is_connected()
                    {
                        tracing::debug!("Channel down, polling dashboard stats");
                        inner.load().await;
                    }
                }
            },
        ));
    }

    /// Stops every timer and closes the channel. Idempotent.
    pub async fn unmount(&self) {
        let (connection, reconnect, poll, mut fetches) = {
            let mut state = self.inner.state();
            if !state.mounted {
                return;
            }
            state.mounted = false;
            state.epoch += 1;
            state.backoff = None;
            (
                state.connection.take(),
                state.reconnect.take(),
                state.poll.take(),
                std::mem::take(&mut state.fetches),
            )
        };

        for mut task in [reconnect, poll].into_iter().flatten() {
            task.cancel();
        }
        fetches.shutdown().await;
        if let Some(connection) = connection {
            connection.close().await;
        }
        self.inner.connected.send_replace(false);
        tracing::info!("Dashboard feed unmounted");
    }

    /// Manual full refresh
    pub async fn refresh(&self) -> Result<()> {
        let fresh = self.inner.source.fetch_snapshot().await?;
        self.inner.snapshot.send_modify(|snapshot| snapshot.replace(fresh));
        self.inner.ui.notify(NoticeLevel::Success, "Data refreshed");
        Ok(())
    }

    /// Asks the server to push current stats over the open channel
    pub async fn request_stats(&self) -> Result<()> {
        let connection = self
            .inner
            .live_connection()
            .ok_or(SessionError::NotConnected)?;
        tracing::debug!("[{}] Requesting stats", connection.key());
        connection
            .send_message(&Envelope::new(message_types::GET_STATS))
            .await
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.state().mounted
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.snapshot.borrow().last_updated
    }

    pub fn has_data(&self) -> bool {
        self.inner.snapshot.borrow().has_data()
    }
}

impl FeedInner {
    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Full fetch; failures are logged and the current snapshot kept
    async fn load(&self) {
        match self.source.fetch_snapshot().await {
            Ok(fresh) => {
                self.snapshot.send_modify(|snapshot| snapshot.replace(fresh));
                tracing::debug!("Dashboard snapshot loaded");
            }
            Err(e) => tracing::warn!("Failed to load dashboard stats: {}", e),
        }
    }

    /// The open channel, if any; cloned out so no lock is held across a send
    fn live_connection(&self) -> Option<Arc<HeartbeatConnection>> {
        self.state()
            .connection
            .as_ref()
            .filter(|connection| connection.is_connected())
            .cloned()
    }

    fn open_channel(self: &Arc<Self>, state: &mut FeedState) {
        let epoch = state.epoch;
        let (on_open, on_message, on_close) = (
            Arc::downgrade(self),
            Arc::downgrade(self),
            Arc::downgrade(self),
        );

        let callbacks = ConnectionCallbacks::new()
            .on_connected(move || {
                if let Some(inner) = on_open.upgrade() {
                    inner.handle_open(epoch);
                }
            })
            .on_message(move |message| {
                if let Some(inner) = on_message.upgrade() {
                    inner.handle_message(message);
                }
            })
            .on_disconnected(move |cause| {
                if let Some(inner) = on_close.upgrade() {
                    inner.handle_close(epoch, cause);
                }
            });

        match HeartbeatConnection::open(
            &self.endpoint,
            self.credentials.as_ref(),
            Arc::clone(&self.connector),
            callbacks,
            self.options.connection.clone(),
        ) {
            Ok(connection) => state.connection = Some(Arc::new(connection)),
            Err(e) => {
                tracing::warn!("Dashboard channel could not be opened: {}", e);
                self.schedule_reconnect(state);
            }
        }
    }

    fn handle_open(&self, epoch: u64) {
        let mut state = self.state();
        if !state.mounted || state.epoch != epoch {
            return;
        }
        if let Some(mut pending) = state.reconnect.take() {
            pending.cancel();
        }
        if let Some(backoff) = state.backoff.as_mut() {
            backoff.reset();
        }
        drop(state);

        self.connected.send_replace(true);
        self.ui.notify(NoticeLevel::Success, "Live updates connected");
    }

    /// Snapshot mutations happen here, one message at a time
    fn handle_message(&self, message: &PushMessage) {
        let mut outcome = Ok(false);
        self.snapshot.send_if_modified(|snapshot| {
            outcome = snapshot.apply(message);
            matches!(outcome, Ok(true))
        });

        match outcome {
            Ok(true) => {
                if let PushMessage::DocumentUploaded(envelope) = message {
                    let filename = envelope
                        .data
                        .as_ref()
                        .and_then(|data| data.get("filename"))
                        .and_then(|name| name.as_str())
                        .unwrap_or("<unnamed>");
                    self.ui
                        .notify(NoticeLevel::Info, &format!("New document uploaded: {}", filename));
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Dropping dashboard message: {}", e),
        }
    }

    fn handle_close(self: &Arc<Self>, epoch: u64, cause: &CloseCause) {
        self.connected.send_replace(false);

        let mut state = self.state();
        if !state.mounted || state.epoch != epoch {
            return;
        }
        tracing::info!("Dashboard channel closed ({:?}), scheduling reconnect", cause);
        self.schedule_reconnect(&mut state);
    }

    fn schedule_reconnect(self: &Arc<Self>, state: &mut FeedState) {
        let Some(backoff) = state.backoff.as_mut() else {
            return;
        };
        let delay = backoff.next_delay();
        let attempt = backoff.attempts();
        let epoch = state.epoch;
        let weak: Weak<Self> = Arc::downgrade(self);

        state.reconnect = Some(ScheduledTask::after(delay, async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let stale = {
                let mut state = inner.state();
                if !state.mounted || state.epoch != epoch {
                    return;
                }
                tracing::info!("Reconnecting dashboard channel (attempt {})", attempt);
                let stale = state.connection.take();
                // This task is the one being replaced; let it finish on its own
                if let Some(current) = state.reconnect.take() {
                    current.detach();
                }
                FeedInner::open_channel(&inner, &mut state);
                stale
            };
            drop(stale);
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{KeyValueStore, MemoryStore};
    use crate::testing::{MockConnector, RecordingUi, ScriptedTransport, StaticCredentials};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for CountingSource {
        async fn fetch_snapshot(&self) -> Result<DashboardSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(json!({
                "documents": {"total": 2, "recent_7days": 1, "trend_percent": 0.0},
                "sessions": {"total": 1, "active_7days": 1, "trend_percent": 0.0},
                "queries": {"total": 9, "recent_7days": 4, "trend_percent": 0.0},
                "users": {"total": 1, "active": 1},
                "active_sessions": [{"session_id": "s-1", "message_count": 1}]
            }))?)
        }
    }

    struct Fixture {
        feed: DashboardFeed,
        source: Arc<CountingSource>,
        connector: Arc<MockConnector>,
        ui: Arc<RecordingUi>,
    }

    fn fixture() -> Fixture {
        let source = Arc::new(CountingSource::default());
        let connector = MockConnector::new();
        let ui = Arc::new(RecordingUi::default());
        let feed = DashboardFeed::new(
            DashboardEndpoint::new("ws://localhost:8800"),
            source.clone(),
            Arc::new(StaticCredentials::anonymous()),
            connector.clone(),
            ui.clone(),
            FeedOptions::default(),
        );
        Fixture {
            feed,
            source,
            connector,
            ui,
        }
    }

    async fn wait_connected(feed: &DashboardFeed, connected: bool) {
        feed.watch_connected()
            .wait_for(|c| *c == connected)
            .await
            .unwrap();
    }

    fn fetches(f: &Fixture) -> usize {
        f.source.calls.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_fetches_once_and_suppresses_polling() {
        let f = fixture();
        f.feed.mount();
        f.feed.mount();
        let _socket = f.connector.accept().await;
        wait_connected(&f.feed, true).await;

        time::sleep(Duration::from_millis(DASHBOARD_POLL_INTERVAL * 3 + 100)).await;

        assert_eq!(fetches(&f), 1);
        assert_eq!(f.connector.connects(), 1);
        assert!(f.feed.has_data());
        assert!(f.feed.last_updated().is_some());
        assert!(f.ui.messages().contains(&"Live updates connected".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_and_retries_while_channel_is_down() {
        let f = fixture();
        f.connector.refuse_next(1000);
        f.feed.mount();

        time::sleep(Duration::from_millis(DASHBOARD_POLL_INTERVAL * 2 + 1000)).await;

        assert!(!f.feed.is_connected());
        assert_eq!(fetches(&f), 3);
        // First attempt plus one every reconnect delay
        assert_eq!(f.connector.connects(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_fixed_delay() {
        let f = fixture();
        f.feed.mount();
        let socket = f.connector.accept().await;
        wait_connected(&f.feed, true).await;

        socket.fail("server restarted");
        wait_connected(&f.feed, false).await;
        let dropped = time::Instant::now();

        let _second = f.connector.accept().await;
        wait_connected(&f.feed, true).await;

        assert_eq!(
            time::Instant::now() - dropped,
            Duration::from_millis(DASHBOARD_RECONNECT_DELAY)
        );
        assert_eq!(f.connector.connects(), 2);
        // Lost dashboard channels are never reported as errors
        assert!(f.ui.notices().iter().all(|(level, _)| *level != NoticeLevel::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_messages_patch_snapshot() {
        let f = fixture();
        f.feed.mount();
        let socket = f.connector.accept().await;
        wait_connected(&f.feed, true).await;
        time::sleep(Duration::from_millis(10)).await;
        let mut updates = f.feed.subscribe();

        socket.send_json(json!({"type": "stats_update", "data": {"users": {"total": 5, "active": 3}}}));
        socket.send_json(json!({"type": "document_uploaded", "data": {"id": 3, "filename": "a.pdf"}}));
        socket.send_json(json!({"type": "new_query", "data": {"question": "?"}}));
        socket.send_json(json!({"type": "new_message", "data": {"session_id": "s-1", "content": "hello"}}));
        socket.send_json(json!({"type": "new_message", "data": {"session_id": "ghost", "content": "boo"}}));
        socket.send_json(json!({"type": "error", "message": "stats unavailable"}));
        time::sleep(Duration::from_millis(10)).await;

        assert!(updates.has_changed().unwrap());
        let snapshot = f.feed.snapshot();
        assert_eq!(snapshot.users.total, 5);
        assert_eq!(snapshot.documents.total, 3);
        assert_eq!(snapshot.recent_documents[0].filename, "a.pdf");
        assert_eq!(snapshot.queries.total, 10);
        assert_eq!(snapshot.sessions.total, 1);
        assert_eq!(snapshot.active_sessions.len(), 1);
        assert_eq!(snapshot.active_sessions[0].message_count, 2);
        assert_eq!(snapshot.active_sessions[0].last_message, "hello...");
        assert!(f.feed.is_connected());
        assert!(
            f.ui.messages()
                .contains(&"New document uploaded: a.pdf".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_stats_needs_open_channel() {
        let f = fixture();
        assert!(matches!(
            f.feed.request_stats().await,
            Err(SessionError::NotConnected)
        ));

        f.feed.mount();
        let mut socket = f.connector.accept().await;
        wait_connected(&f.feed, true).await;
        f.feed.request_stats().await.unwrap();

        assert_eq!(socket.recv_text().await.as_deref(), Some(r#"{"type":"get_stats"}"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_leaves_nothing_scheduled() {
        let f = fixture();
        f.feed.mount();
        let mut socket = f.connector.accept().await;
        wait_connected(&f.feed, true).await;

        f.feed.unmount().await;
        f.feed.unmount().await;
        time::sleep(Duration::from_secs(300)).await;

        assert!(!f.feed.is_mounted());
        assert!(!f.feed.is_connected());
        assert_eq!(f.connector.connects(), 1);
        assert_eq!(fetches(&f), 1);
        assert!(socket.closed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_cancels_pending_reconnect() {
        let f = fixture();
        f.connector.refuse_next(1000);
        f.feed.mount();
        time::sleep(Duration::from_millis(DASHBOARD_RECONNECT_DELAY / 2)).await;

        f.feed.unmount().await;
        time::sleep(Duration::from_secs(300)).await;

        assert_eq!(f.connector.connects(), 1);
        assert_eq!(fetches(&f), 1);

        f.feed.mount();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_api_client_snapshot_source() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = Arc::new(crate::auth::AuthSession::new(store));
        let transport = Arc::new(ScriptedTransport::new());
        let documents: Vec<_> = (0..7).map(|n| json!({"id": n, "filename": n.to_string()})).collect();
        transport.push_status(200, json!({"recent_documents": documents}));
        let client = ApiClient::new(
            transport.clone(),
            session,
            Arc::new(RecordingUi::default()),
            "/login",
        );

        let snapshot = client.fetch_snapshot().await.unwrap();

        assert_eq!(snapshot.recent_documents.len(), 7);
        assert_eq!(transport.calls()[0].request.path, "/api/dashboard/stats");
    }
}
