use crate::auth::{ApiClient, AuthService, AuthSession, FileStore, KeyValueStore, MemoryStore};
use crate::config::SessionConfig;
use crate::connection::DashboardEndpoint;
use crate::dashboard::DashboardFeed;
use crate::infrastructure::{HttpTransport, ReqwestTransport};
use crate::pool::ConnectionPool;
use crate::status::{HttpProbe, StatusProber, UptimeClock};
use crate::types::Result;
use crate::ui::{TracingUi, UiBridge};
use crate::websocket::{SocketConnector, WebSocketFactory};
use std::sync::Arc;

/// Everything one signed-in console needs, wired together.
///
/// Nothing is started on build: mount the feed and start the prober when
/// the views that show them appear, and call `shutdown` when the session
/// ends.
pub struct ConsoleSession {
    config: SessionConfig,
    store: Arc<dyn KeyValueStore>,
    auth: Arc<AuthSession>,
    client: ApiClient,
    service: AuthService,
    pool: ConnectionPool,
    feed: DashboardFeed,
    prober: StatusProber,
}

impl ConsoleSession {
    pub fn builder(config: SessionConfig) -> ConsoleSessionBuilder {
        ConsoleSessionBuilder::new(config)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn auth(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn service(&self) -> &AuthService {
        &self.service
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn feed(&self) -> &DashboardFeed {
        &self.feed
    }

    pub fn prober(&self) -> &StatusProber {
        &self.prober
    }

    /// Stops the prober, unmounts the feed and closes every task channel.
    /// Idempotent.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down console session");
        self.prober.stop();
        self.feed.unmount().await;
        self.pool.disconnect_all().await;
    }
}

/// Builds a `ConsoleSession`; production implementations fill any seam
/// left unset
pub struct ConsoleSessionBuilder {
    config: SessionConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    ui: Option<Arc<dyn UiBridge>>,
    transport: Option<Arc<dyn HttpTransport>>,
    connector: Option<Arc<dyn SocketConnector>>,
}

impl ConsoleSessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            store: None,
            ui: None,
            transport: None,
            connector: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ui(mut self, ui: Arc<dyn UiBridge>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn SocketConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn build(self) -> Result<ConsoleSession> {
        let config = self.config;
        config.validate()?;

        let store: Arc<dyn KeyValueStore> = match (self.store, &config.state_file) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(FileStore::open(path)?),
            (None, None) => Arc::new(MemoryStore::new()),
        };
        let ui: Arc<dyn UiBridge> = self.ui.unwrap_or_else(|| Arc::new(TracingUi));
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(
                &config.api_url,
                config.request_timeout,
            )?),
        };
        let connector: Arc<dyn SocketConnector> = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketFactory));

        let auth = Arc::new(AuthSession::restore(Arc::clone(&store)));
        let client = ApiClient::new(
            Arc::clone(&transport),
            auth.clone(),
            Arc::clone(&ui),
            config.login_route.clone(),
        );
        let service = AuthService::new(client.clone(), Arc::clone(&auth));

        let ws_base = config.ws_base();
        let pool = ConnectionPool::new(
            ws_base.clone(),
            auth.clone(),
            Arc::clone(&connector),
            Arc::clone(&ui),
            config.task_options(),
        );
        let feed = DashboardFeed::new(
            DashboardEndpoint::new(ws_base).with_token(config.dashboard_token),
            Arc::new(client.clone()),
            auth.clone(),
            connector,
            ui,
            config.feed_options(),
        );
        let prober = StatusProber::with_timing(
            Arc::new(HttpProbe::new(transport).with_timeout(config.probe_timeout)),
            UptimeClock::restore(store.as_ref()),
            config.probe_interval,
            config.probe_timeout,
        );

        tracing::debug!("Console session ready for {}", config.api_url);
        Ok(ConsoleSession {
            config,
            store,
            auth,
            client,
            service,
            pool,
            feed,
            prober,
        })
    }
}
