use serde::{Deserialize, Serialize};

/// Signed-in user as returned by the auth endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// Body of a login, register or refresh response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

/// Everything the console knows about the signed-in user
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<UserInfo>,
    pub permissions: Vec<String>,
}

impl SessionCredentials {
    pub fn from_token_response(response: TokenResponse) -> Self {
        let permissions = response
            .user
            .as_ref()
            .map(|user| user.permissions.clone())
            .unwrap_or_default();

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            user: response.user,
            permissions,
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_all_permissions(&self, permissions: &[&str]) -> bool {
        permissions.iter().all(|p| self.has_permission(p))
    }

    pub fn has_any_permission(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.has_permission(p))
    }

    pub fn role(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.role.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some("admin")
    }
}

/// Outcome the request client reports back to the credential owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSignal {
    /// A refresh produced a new access token
    Refreshed { access_token: String },
    /// Credentials are no longer usable; the session must be torn down
    Invalidated,
}

/// Read access to the current credentials plus a way to report outcomes.
///
/// Implementors own the credentials; callers never mutate them directly.
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn signal(&self, signal: AuthSignal);
}
