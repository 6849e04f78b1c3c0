//! Credentials, their persistence, and the authenticated request client
//!
//! `AuthSession` is the only writer of credentials. `ApiClient` reads them
//! through `CredentialProvider` and reports refresh outcomes back as
//! `AuthSignal`s.

pub mod client;
pub mod credentials;
pub mod service;
pub mod session;
pub mod store;

pub use client::{ApiClient, Attempt};
pub use credentials::{AuthSignal, CredentialProvider, SessionCredentials, TokenResponse, UserInfo};
pub use service::{AuthService, Registration};
pub use session::{AuthSession, SessionStatus};
pub use store::{FileStore, KeyValueStore, MemoryStore};
