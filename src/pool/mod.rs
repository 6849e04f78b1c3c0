// Pool module - Per-task push channels
pub mod core;

pub use core::ConnectionPool;
