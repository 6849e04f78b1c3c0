pub mod factory;

pub use factory::{SocketConnector, SocketSink, SocketStream, WebSocketFactory, redact};
