//! # RAG console session layer
//!
//! Client-side session plumbing for the RAG admin console: an authenticated
//! request client that refreshes its token at most once per request,
//! heartbeat WebSocket channels for task progress, a live dashboard feed
//! with a polling fallback, and a backend health prober.
//!
//! ## Example
//!
//! ```no_run
//! use ragconsole_session::{ConnectionCallbacks, ConsoleSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ConsoleSession::builder(SessionConfig::from_env()?).build()?;
//!
//!     session.service().login("admin", "secret").await?;
//!     session.feed().mount();
//!
//!     let callbacks = ConnectionCallbacks::new()
//!         .on_progress(|envelope| println!("progress: {:?}", envelope.data));
//!     session.pool().connect("task-42", callbacks).await?;
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod connection;
pub mod console;
pub mod dashboard;
pub mod infrastructure;
pub mod messaging;
pub mod pool;
pub mod status;
pub mod types;
pub mod ui;
pub mod websocket;

#[cfg(test)]
mod testing;

pub use auth::{ApiClient, AuthService, AuthSession, CredentialProvider, KeyValueStore};
pub use config::SessionConfig;
pub use connection::{ConnectionCallbacks, ConnectionOptions, ConnectionState, HeartbeatConnection};
pub use console::{ConsoleSession, ConsoleSessionBuilder};
pub use dashboard::{DashboardFeed, DashboardSnapshot};
pub use infrastructure::{ApiRequest, ApiResponse, HttpTransport};
pub use pool::ConnectionPool;
pub use status::{HealthStatus, StatusProber, StatusReport};
pub use types::{Envelope, PushMessage, Result, SessionError};
pub use ui::{NoticeLevel, TracingUi, UiBridge};
pub use websocket::{SocketConnector, WebSocketFactory};
