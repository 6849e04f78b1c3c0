use super::{AuthSignal, CredentialProvider, KeyValueStore, SessionCredentials, TokenResponse, UserInfo};
use crate::types::constants::storage_keys;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

/// Coarse authentication state, published to watchers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Authenticated,
    /// Torn down after an unrecoverable refresh failure
    Expired,
}

/// Sole owner of the session credentials.
///
/// Every change is mirrored to the persistent store so a restart picks the
/// session back up.
pub struct AuthSession {
    store: Arc<dyn KeyValueStore>,
    credentials: RwLock<Option<SessionCredentials>>,
    status: watch::Sender<SessionStatus>,
}

impl AuthSession {
    /// Empty session
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (status, _) = watch::channel(SessionStatus::Anonymous);
        Self {
            store,
            credentials: RwLock::new(None),
            status,
        }
    }

    /// Session rebuilt from whatever the store holds
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let session = Self::new(Arc::clone(&store));

        let Some(access_token) = store.get(storage_keys::ACCESS_TOKEN) else {
            return session;
        };

        let user = store
            .get(storage_keys::USER_INFO)
            .and_then(|raw| match serde_json::from_str::<UserInfo>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable stored user info: {}", e);
                    None
                }
            });
        let permissions = store
            .get(storage_keys::USER_PERMISSIONS)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .unwrap_or_default();

        *session.write() = Some(SessionCredentials {
            access_token,
            refresh_token: store.get(storage_keys::REFRESH_TOKEN),
            user,
            permissions,
        });
        session.status.send_replace(SessionStatus::Authenticated);
        tracing::debug!("Restored session from storage");

        session
    }

    /// Installs credentials from a login/register response
    pub fn establish(&self, response: TokenResponse) -> SessionCredentials {
        let credentials = SessionCredentials::from_token_response(response);

        self.store
            .set(storage_keys::ACCESS_TOKEN, &credentials.access_token);
        match &credentials.refresh_token {
            Some(token) => self.store.set(storage_keys::REFRESH_TOKEN, token),
            None => self.store.remove(storage_keys::REFRESH_TOKEN),
        }
        if let Some(user) = &credentials.user {
            self.persist_user(user);
        }

        *self.write() = Some(credentials.clone());
        self.status.send_replace(SessionStatus::Authenticated);
        tracing::info!(
            "Session established for {}",
            credentials
                .user
                .as_ref()
                .map(|u| u.username.as_str())
                .unwrap_or("<unknown user>")
        );

        credentials
    }

    /// Replaces the cached user and permissions
    pub fn update_user(&self, user: UserInfo) {
        self.persist_user(&user);
        if let Some(credentials) = self.write().as_mut() {
            credentials.permissions = user.permissions.clone();
            credentials.user = Some(user);
        }
    }

    /// Drops every credential. `status` says why.
    pub fn clear(&self, status: SessionStatus) {
        for key in storage_keys::SESSION_KEYS {
            self.store.remove(key);
        }
        *self.write() = None;
        self.status.send_replace(status);
    }

    pub fn credentials(&self) -> Option<SessionCredentials> {
        self.read().clone()
    }

    pub fn user(&self) -> Option<UserInfo> {
        self.read().as_ref().and_then(|c| c.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.read()
            .as_ref()
            .is_some_and(|c| c.has_permission(permission))
    }

    pub fn has_all_permissions(&self, permissions: &[&str]) -> bool {
        self.read()
            .as_ref()
            .is_some_and(|c| c.has_all_permissions(permissions))
    }

    pub fn has_any_permission(&self, permissions: &[&str]) -> bool {
        self.read()
            .as_ref()
            .is_some_and(|c| c.has_any_permission(permissions))
    }

    pub fn is_admin(&self) -> bool {
        self.read().as_ref().is_some_and(|c| c.is_admin())
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Watch status transitions (e.g. to react to `Expired`)
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    fn persist_user(&self, user: &UserInfo) {
        match (
            serde_json::to_string(user),
            serde_json::to_string(&user.permissions),
        ) {
            (Ok(user_json), Ok(permissions_json)) => {
                self.store.set(storage_keys::USER_INFO, &user_json);
                self.store
                    .set(storage_keys::USER_PERMISSIONS, &permissions_json);
            }
            (Err(e), _) | (_, Err(e)) => tracing::warn!("Failed to persist user info: {}", e),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<SessionCredentials>> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<SessionCredentials>> {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialProvider for AuthSession {
    fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|c| c.access_token.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().as_ref().and_then(|c| c.refresh_token.clone())
    }

    fn signal(&self, signal: AuthSignal) {
        match signal {
            AuthSignal::Refreshed { access_token } => {
                self.store.set(storage_keys::ACCESS_TOKEN, &access_token);
                if let Some(credentials) = self.write().as_mut() {
                    credentials.access_token = access_token;
                }
                tracing::debug!("Access token refreshed");
            }
            AuthSignal::Invalidated => {
                tracing::warn!("Session invalidated, clearing credentials");
                self.clear(SessionStatus::Expired);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;
    use serde_json::json;

    fn login_response() -> TokenResponse {
        serde_json::from_value(json!({
            "access_token": "a-1",
            "refresh_token": "r-1",
            "user": {"id": 7, "username": "ops", "role": "user", "permissions": ["query:run"]}
        }))
        .unwrap()
    }

    #[test]
    fn test_establish_persists_and_restores() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = AuthSession::new(Arc::clone(&store));
        assert_eq!(session.status(), SessionStatus::Anonymous);

        session.establish(login_response());
        assert_eq!(session.status(), SessionStatus::Authenticated);
        assert_eq!(store.get("access_token").as_deref(), Some("a-1"));
        assert_eq!(store.get("user_permissions").as_deref(), Some(r#"["query:run"]"#));

        let restored = AuthSession::restore(store);
        assert_eq!(restored.access_token().as_deref(), Some("a-1"));
        assert_eq!(restored.refresh_token().as_deref(), Some("r-1"));
        assert_eq!(restored.user().map(|u| u.username), Some("ops".to_string()));
        assert!(restored.has_permission("query:run"));
        assert!(!restored.is_admin());
    }

    #[test]
    fn test_refreshed_signal_only_swaps_access_token() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = AuthSession::new(Arc::clone(&store));
        session.establish(login_response());

        session.signal(AuthSignal::Refreshed {
            access_token: "a-2".to_string(),
        });

        assert_eq!(session.access_token().as_deref(), Some("a-2"));
        assert_eq!(session.refresh_token().as_deref(), Some("r-1"));
        assert_eq!(store.get("access_token").as_deref(), Some("a-2"));
    }

    #[test]
    fn test_invalidated_signal_clears_everything() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set("app_start_time", "1");
        let session = AuthSession::new(Arc::clone(&store));
        session.establish(login_response());
        let mut status = session.subscribe();

        session.signal(AuthSignal::Invalidated);

        assert!(!session.is_authenticated());
        assert_eq!(session.access_token(), None);
        assert_eq!(*status.borrow_and_update(), SessionStatus::Expired);
        for key in storage_keys::SESSION_KEYS {
            assert_eq!(store.get(key), None, "{} should be cleared", key);
        }
        assert_eq!(store.get("app_start_time").as_deref(), Some("1"));
    }

    #[test]
    fn test_restore_without_token_is_anonymous() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set("user_info", "{broken");
        let session = AuthSession::restore(store);
        assert_eq!(session.status(), SessionStatus::Anonymous);
        assert!(!session.has_permission("anything"));
    }
}
