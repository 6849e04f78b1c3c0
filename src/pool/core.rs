use crate::auth::CredentialProvider;
use crate::connection::{ConnectionCallbacks, ConnectionOptions, HeartbeatConnection, TaskEndpoint};
use crate::types::{Result, SessionError};
use crate::ui::{NoticeLevel, UiBridge};
use crate::websocket::SocketConnector;
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;

/// Independent task progress channels, at most one per task id.
///
/// A connection leaves the pool exactly once: when its own close event
/// fires, or when the pool takes it out to close it. Lost connections are
/// not retried.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    ws_base: String,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn SocketConnector>,
    ui: Arc<dyn UiBridge>,
    options: ConnectionOptions,
    entries: Mutex<HashMap<String, PoolEntry>>,
    next_generation: AtomicU64,
}

struct PoolEntry {
    generation: u64,
    connection: Arc<HeartbeatConnection>,
}

impl ConnectionPool {
    pub fn new(
        ws_base: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn SocketConnector>,
        ui: Arc<dyn UiBridge>,
        options: ConnectionOptions,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                ws_base: ws_base.into(),
                credentials,
                connector,
                ui,
                options,
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Opens the progress channel for `task_id`, replacing any existing one.
    ///
    /// Without an access token nothing is attempted: the user is told to
    /// sign in and `MissingCredential` is returned.
    pub async fn connect(
        &self,
        task_id: &str,
        callbacks: ConnectionCallbacks,
    ) -> Result<Arc<HeartbeatConnection>> {
        if self.inner.credentials.access_token().is_none() {
            let error = SessionError::MissingCredential;
            self.inner
                .ui
                .notify(NoticeLevel::Error, &error.user_message());
            return Err(error);
        }

        if let Some(previous) = self.inner.take(task_id) {
            tracing::info!("[{}] Replacing existing task connection", task_id);
            previous.connection.close().await;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let pool = Arc::downgrade(&self.inner);
        let key = task_id.to_string();
        let callbacks = callbacks.with_close_hook(move |_| {
            if let Some(pool) = pool.upgrade() {
                pool.release(&key, generation);
            }
        });

        let endpoint = TaskEndpoint::new(self.inner.ws_base.as_str(), task_id);
        let connection = Arc::new(HeartbeatConnection::open(
            &endpoint,
            self.inner.credentials.as_ref(),
            Arc::clone(&self.inner.connector),
            callbacks,
            self.inner.options.clone(),
        )?);

        let displaced = {
            let mut entries = self.inner.entries();
            // Already closed means the close hook found nothing to remove
            if connection.is_closed() {
                None
            } else {
                entries.insert(
                    task_id.to_string(),
                    PoolEntry {
                        generation,
                        connection: Arc::clone(&connection),
                    },
                )
            }
        };
        if let Some(displaced) = displaced {
            tracing::warn!("[{}] Concurrent connect displaced a connection", task_id);
            displaced.connection.close().await;
        }

        Ok(connection)
    }

    /// Closes the channel for `task_id`. Unknown ids are ignored.
    pub async fn disconnect(&self, task_id: &str) {
        if let Some(entry) = self.inner.take(task_id) {
            tracing::info!("[{}] Disconnecting task connection", task_id);
            entry.connection.close().await;
        }
    }

    /// Closes every tracked channel
    pub async fn disconnect_all(&self) {
        let entries: Vec<PoolEntry> = self.inner.entries().drain().map(|(_, e)| e).collect();
        if entries.is_empty() {
            return;
        }

        tracing::info!("Disconnecting {} task connections", entries.len());
        join_all(entries.iter().map(|entry| entry.connection.close())).await;
    }

    /// Runs `disconnect_all` once `signal` resolves, e.g. on `ctrl_c`.
    /// The watcher holds no strong reference to the pool.
    pub fn close_on<F>(&self, signal: F) -> JoinHandle<()>
    where
        F: Future + Send + 'static,
    {
        let pool: Weak<PoolInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            signal.await;
            if let Some(inner) = pool.upgrade() {
                tracing::info!("Shutdown signal received, closing task connections");
                ConnectionPool { inner }.disconnect_all().await;
            }
        })
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<HeartbeatConnection>> {
        self.inner
            .entries()
            .get(task_id)
            .map(|entry| Arc::clone(&entry.connection))
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.inner.entries().contains_key(task_id)
    }

    pub fn task_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.entries().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PoolInner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, PoolEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self, task_id: &str) -> Option<PoolEntry> {
        self.entries().remove(task_id)
    }

    /// Close hook: drops the entry only if it is still the one that closed
    fn release(&self, task_id: &str, generation: u64) {
        let mut entries = self.entries();
        if entries
            .get(task_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            entries.remove(task_id);
            tracing::debug!("[{}] Removed closed task connection", task_id);
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let entries = std::mem::take(
            self.entries
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if !entries.is_empty() {
            tracing::debug!("Pool dropped with {} open connections", entries.len());
        }
        for entry in entries.into_values() {
            entry.connection.abort();
        }
    }
}
