use super::{AuthSignal, CredentialProvider, TokenResponse};
use crate::infrastructure::{ApiRequest, ApiResponse, HttpTransport};
use crate::types::constants::endpoints;
use crate::types::{Result, SessionError};
use crate::ui::{NoticeLevel, UiBridge};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Which try of an original call is being dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    /// The single re-issue after a successful refresh
    Retry,
}

/// Authenticated request pipeline.
///
/// Adds the bearer token to every request and, on a 401, refreshes the
/// access token once and re-issues the request once. A second 401, a missing
/// refresh token or a failed refresh tears the session down and sends the
/// user to the login route.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialProvider>,
    ui: Arc<dyn UiBridge>,
    login_route: String,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialProvider>,
        ui: Arc<dyn UiBridge>,
        login_route: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                credentials,
                ui,
                login_route: login_route.into(),
            }),
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialProvider> {
        &self.inner.credentials
    }

    /// Sends `request`, failing with `SessionError::Http` on any non-2xx answer
    /// that survives the refresh path.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut attempt = Attempt::First;

        loop {
            let response = match self.dispatch(&request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!("{} {} failed: {}", request.method, request.path, e);
                    self.surface(&e);
                    return Err(e);
                }
            };

            if response.is_success() {
                return Ok(response);
            }

            if response.status == 401 && !is_credential_endpoint(&request.path) {
                self.recover(attempt, &request).await?;
                attempt = Attempt::Retry;
                continue;
            }

            let error = SessionError::Http {
                status: response.status,
                body: response.body,
            };
            tracing::warn!(
                "{} {} rejected with {}",
                request.method,
                request.path,
                response.status
            );
            // A 401 here comes from the login/register call itself; its caller reports it
            if response.status != 401 {
                self.surface(&error);
            }
            return Err(error);
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(ApiRequest::post(path).with_json(body)?)
            .await?
            .json()
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Handles a 401: refresh on the first attempt, give up otherwise
    async fn recover(&self, attempt: Attempt, request: &ApiRequest) -> Result<()> {
        let refresh_token = match (attempt, self.inner.credentials.refresh_token()) {
            (Attempt::First, Some(token)) => token,
            (Attempt::First, None) => {
                tracing::warn!("401 on {} with no refresh token", request.path);
                return Err(self.expire());
            }
            (Attempt::Retry, _) => {
                tracing::warn!("401 on retried {}, not refreshing again", request.path);
                return Err(self.expire());
            }
        };

        match self.refresh(&refresh_token).await {
            Ok(access_token) => {
                self.inner
                    .credentials
                    .signal(AuthSignal::Refreshed { access_token });
                tracing::info!("Token refreshed, retrying {}", request.path);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                Err(self.expire())
            }
        }
    }

    /// One refresh call, dispatched outside the 401 handling path
    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let request = ApiRequest::post(endpoints::REFRESH)
            .with_json(&serde_json::json!({ "refresh_token": refresh_token }))?;
        let response = self.dispatch(&request).await?;

        if !response.is_success() {
            return Err(SessionError::Http {
                status: response.status,
                body: response.body,
            });
        }

        let token: TokenResponse = response.json()?;
        Ok(token.access_token)
    }

    fn expire(&self) -> SessionError {
        self.inner.credentials.signal(AuthSignal::Invalidated);
        self.inner.ui.navigate(&self.inner.login_route);
        SessionError::AuthExpired
    }

    /// The token is read here, at dispatch time, so a retry always carries
    /// whatever the refresh just installed.
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let token = self.inner.credentials.access_token();
        self.inner
            .transport
            .execute(request, token.as_deref())
            .await
    }

    fn surface(&self, error: &SessionError) {
        self.inner
            .ui
            .notify(NoticeLevel::Error, &error.user_message());
    }
}

fn is_credential_endpoint(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    path == endpoints::LOGIN || path == endpoints::REGISTER
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthSession, KeyValueStore, MemoryStore, SessionStatus, TokenResponse};
    use crate::testing::{RecordingUi, ScriptedTransport};
    use serde_json::json;

    struct Fixture {
        transport: Arc<ScriptedTransport>,
        session: Arc<AuthSession>,
        ui: Arc<RecordingUi>,
        client: ApiClient,
    }

    fn fixture(refresh_token: Option<&str>) -> Fixture {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = Arc::new(AuthSession::new(store));
        session.establish(TokenResponse {
            access_token: "old".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            user: None,
        });
        let transport = Arc::new(ScriptedTransport::new());
        let ui = Arc::new(RecordingUi::default());
        let client = ApiClient::new(
            transport.clone(),
            session.clone(),
            ui.clone(),
            "/login",
        );
        Fixture {
            transport,
            session,
            ui,
            client,
        }
    }

    #[tokio::test]
    async fn test_bearer_token_injected() {
        let f = fixture(Some("r"));
        f.transport.push_status(200, json!({"ok": true}));

        let response = f.client.send(ApiRequest::get("/api/documents")).await.unwrap();

        assert_eq!(response.body, json!({"ok": true}));
        let calls = f.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].bearer.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_missing_token_is_not_an_error() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = Arc::new(AuthSession::new(store));
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(200, json!({"status": "healthy"}));
        let client = ApiClient::new(
            transport.clone(),
            session,
            Arc::new(RecordingUi::default()),
            "/login",
        );

        client.send(ApiRequest::get("/health")).await.unwrap();
        assert_eq!(transport.calls()[0].bearer, None);
    }

    #[tokio::test]
    async fn test_refresh_then_retry_uses_new_token() {
        let f = fixture(Some("r"));
        f.transport.push_status(401, json!({"detail": "expired"}));
        f.transport.push_status(200, json!({"access_token": "new"}));
        f.transport.push_status(200, json!({"items": []}));

        let response = f.client.send(ApiRequest::get("/api/documents")).await.unwrap();

        assert_eq!(response.body, json!({"items": []}));
        let calls = f.transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].request.path, "/api/auth/refresh");
        assert_eq!(calls[1].request.body, Some(json!({"refresh_token": "r"})));
        assert_eq!(calls[2].request.path, "/api/documents");
        assert_eq!(calls[2].bearer.as_deref(), Some("new"));
        assert_eq!(f.session.access_token().as_deref(), Some("new"));
        assert!(f.ui.routes().is_empty());
    }

    #[tokio::test]
    async fn test_at_most_one_retry() {
        let f = fixture(Some("r"));
        f.transport.push_status(401, json!({}));
        f.transport.push_status(200, json!({"access_token": "new"}));
        f.transport.push_status(401, json!({}));
        // Anything further would be a second cycle
        f.transport.push_status(200, json!({"access_token": "newer"}));
        f.transport.push_status(200, json!({}));

        let err = f.client.send(ApiRequest::get("/api/documents")).await.unwrap_err();

        assert!(matches!(err, SessionError::AuthExpired));
        assert_eq!(f.transport.calls().len(), 3);
        assert_eq!(
            f.transport
                .calls()
                .iter()
                .filter(|c| c.request.path == "/api/auth/refresh")
                .count(),
            1
        );
        assert_eq!(f.session.status(), SessionStatus::Expired);
        assert_eq!(f.ui.routes(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_no_refresh_token_expires_immediately() {
        let f = fixture(None);
        f.transport.push_status(401, json!({}));

        let err = f.client.send(ApiRequest::get("/api/users")).await.unwrap_err();

        assert!(matches!(err, SessionError::AuthExpired));
        assert_eq!(f.transport.calls().len(), 1);
        assert!(!f.session.is_authenticated());
        assert_eq!(f.ui.routes(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_refresh_expires_without_looping() {
        let f = fixture(Some("r"));
        f.transport.push_status(401, json!({}));
        f.transport.push_status(401, json!({"detail": "refresh token revoked"}));

        let err = f.client.send(ApiRequest::get("/api/users")).await.unwrap_err();

        assert!(matches!(err, SessionError::AuthExpired));
        assert_eq!(f.transport.calls().len(), 2);
        assert_eq!(f.session.status(), SessionStatus::Expired);
    }

    #[tokio::test]
    async fn test_refresh_transport_failure_expires() {
        let f = fixture(Some("r"));
        f.transport.push_status(401, json!({}));
        f.transport
            .push_error(SessionError::Network("connection reset".into()));

        let err = f.client.send(ApiRequest::get("/api/users")).await.unwrap_err();

        assert!(matches!(err, SessionError::AuthExpired));
        assert_eq!(f.ui.routes(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_login_401_is_not_refreshed() {
        let f = fixture(Some("r"));
        f.transport
            .push_status(401, json!({"detail": "bad credentials"}));

        let err = f
            .client
            .send(
                ApiRequest::post("/api/auth/login")
                    .with_json(&json!({"username": "u", "password": "p"}))
                    .unwrap(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(f.transport.calls().len(), 1);
        assert!(f.session.is_authenticated());
        assert!(f.ui.routes().is_empty());
    }

    #[tokio::test]
    async fn test_other_statuses_surface_without_touching_session() {
        let f = fixture(Some("r"));
        f.transport
            .push_status(403, json!({"detail": "domain is read-only"}));
        f.transport.push_status(500, json!({}));

        let forbidden = f.client.send(ApiRequest::delete("/api/domains/1")).await.unwrap_err();
        let server = f.client.send(ApiRequest::get("/api/logs")).await.unwrap_err();

        assert_eq!(forbidden.status(), Some(403));
        assert_eq!(server.status(), Some(500));
        assert!(f.session.is_authenticated());
        let notices = f.ui.messages();
        assert_eq!(notices[0], "domain is read-only");
        assert!(notices[1].starts_with("Internal server error"));
    }

    #[tokio::test]
    async fn test_network_and_config_errors_are_distinct() {
        let f = fixture(Some("r"));
        f.transport.push_error(SessionError::Network("refused".into()));
        f.transport.push_error(SessionError::Config("bad path".into()));

        let network = f.client.send(ApiRequest::get("/api/a")).await.unwrap_err();
        let config = f.client.send(ApiRequest::get("/api/b")).await.unwrap_err();

        assert!(matches!(network, SessionError::Network(_)));
        assert!(matches!(config, SessionError::Config(_)));
        assert!(f.session.is_authenticated());
    }
}
