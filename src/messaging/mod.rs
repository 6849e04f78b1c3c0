// Messaging module - Message kinds and routing
pub mod event;
pub mod router;

pub use event::MessageKind;
pub use router::MessageRouter;
