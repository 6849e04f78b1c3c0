//! Live dashboard: snapshot model and the feed that keeps it current

pub mod feed;
pub mod snapshot;

pub use feed::{DashboardFeed, FeedOptions, SnapshotSource};
pub use snapshot::{
    ActiveSession, ActivityPoint, DashboardSnapshot, DocumentStats, NewMessage, QueryStats,
    RecentDocument, SessionStats, StatsUpdate, UserStats,
};
