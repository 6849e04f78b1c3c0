use super::{ApiClient, AuthSession, SessionCredentials, SessionStatus, TokenResponse, UserInfo};
use crate::infrastructure::ApiRequest;
use crate::types::Result;
use crate::types::constants::endpoints;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    remember_me: bool,
}

/// New account details
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
struct ChangePasswordRequest<'a> {
    old_password: &'a str,
    new_password: &'a str,
    confirm_password: &'a str,
}

/// Sign-in flows layered over the request client
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
    session: Arc<AuthSession>,
}

impl AuthService {
    pub fn new(client: ApiClient, session: Arc<AuthSession>) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// `username` may also be the account email
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionCredentials> {
        let body = LoginRequest {
            username,
            password,
            remember_me: false,
        };
        let response: TokenResponse = self.client.post_json(endpoints::LOGIN, &body).await?;
        Ok(self.session.establish(response))
    }

    /// Creates the account and signs straight in
    pub async fn register(&self, registration: &Registration) -> Result<SessionCredentials> {
        let response: TokenResponse = self
            .client
            .post_json(endpoints::REGISTER, registration)
            .await?;
        Ok(self.session.establish(response))
    }

    /// Always clears local state, even if the server call fails
    pub async fn logout(&self) {
        if self.session.is_authenticated()
            && let Err(e) = self.client.send(ApiRequest::post(endpoints::LOGOUT)).await
        {
            tracing::debug!("Logout notification failed: {}", e);
        }
        self.session.clear(SessionStatus::Anonymous);
        tracing::info!("Signed out");
    }

    /// Fetches the signed-in user and refreshes the cached permissions
    pub async fn current_user(&self) -> Result<UserInfo> {
        let user: UserInfo = self.client.get_json(endpoints::CURRENT_USER).await?;
        self.session.update_user(user.clone());
        Ok(user)
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let body = ChangePasswordRequest {
            old_password,
            new_password,
            confirm_password: new_password,
        };
        let _: Value = self
            .client
            .post_json(endpoints::CHANGE_PASSWORD, &body)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialProvider, KeyValueStore, MemoryStore};
    use crate::testing::{RecordingUi, ScriptedTransport};
    use serde_json::json;

    fn service() -> (AuthService, Arc<ScriptedTransport>, Arc<dyn KeyValueStore>) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = Arc::new(AuthSession::new(Arc::clone(&store)));
        let transport = Arc::new(ScriptedTransport::new());
        let client = ApiClient::new(
            transport.clone(),
            session.clone(),
            Arc::new(RecordingUi::default()),
            "/login",
        );
        (AuthService::new(client, session), transport, store)
    }

    fn token_body() -> Value {
        json!({
            "access_token": "a",
            "refresh_token": "r",
            "token_type": "bearer",
            "expires_in": 1800,
            "user": {"id": 2, "username": "alice", "role": "user", "permissions": ["document:read"]}
        })
    }

    #[tokio::test]
    async fn test_login_establishes_session() {
        let (service, transport, store) = service();
        transport.push_status(200, token_body());

        let credentials = service.login("alice", "secret").await.unwrap();

        assert_eq!(credentials.access_token, "a");
        assert!(service.session().has_permission("document:read"));
        assert_eq!(store.get("refresh_token").as_deref(), Some("r"));
        let calls = transport.calls();
        assert_eq!(calls[0].request.path, "/api/auth/login");
        assert_eq!(calls[0].bearer, None);
        assert_eq!(
            calls[0].request.body.as_ref().and_then(|b| b.get("username")),
            Some(&json!("alice"))
        );
    }

    #[tokio::test]
    async fn test_failed_login_leaves_session_empty() {
        let (service, transport, _) = service();
        transport.push_status(401, json!({"detail": "Incorrect username or password"}));

        let err = service.login("alice", "wrong").await.unwrap_err();

        assert_eq!(err.user_message(), "Incorrect username or password");
        assert!(!service.session().is_authenticated());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_register_signs_in() {
        let (service, transport, _) = service();
        transport.push_status(200, token_body());

        service
            .register(&Registration {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password: "pw".into(),
                confirm_password: "pw".into(),
            })
            .await
            .unwrap();

        assert!(service.session().is_authenticated());
        assert_eq!(transport.calls()[0].request.path, "/api/auth/register");
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let (service, transport, store) = service();
        transport.push_status(200, token_body());
        service.login("alice", "secret").await.unwrap();
        transport.push_status(500, json!({}));

        service.logout().await;

        assert!(!service.session().is_authenticated());
        assert_eq!(service.session().status(), SessionStatus::Anonymous);
        assert_eq!(store.get("access_token"), None);
        assert_eq!(transport.calls()[1].bearer.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_current_user_updates_permissions() {
        let (service, transport, _) = service();
        transport.push_status(200, token_body());
        service.login("alice", "secret").await.unwrap();
        transport.push_status(
            200,
            json!({"id": 2, "username": "alice", "role": "admin", "permissions": ["user:manage"]}),
        );

        let user = service.current_user().await.unwrap();

        assert_eq!(user.role, "admin");
        assert!(service.session().is_admin());
        assert!(service.session().has_permission("user:manage"));
        assert!(!service.session().has_permission("document:read"));
        assert_eq!(service.session().access_token().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_change_password_body() {
        let (service, transport, _) = service();
        transport.push_status(200, json!({"message": "ok"}));

        service.change_password("old", "new").await.unwrap();

        assert_eq!(
            transport.calls()[0].request.body,
            Some(json!({"old_password": "old", "new_password": "new", "confirm_password": "new"}))
        );
    }
}
