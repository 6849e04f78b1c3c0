//! Backend health probing and the uptime counter behind the status bar

pub mod history;
pub mod prober;
pub mod uptime;

pub use history::{HealthStatus, StatusHistory, StatusSample};
pub use prober::{HealthCheck, HttpProbe, StatusProber, StatusReport, classify};
pub use uptime::{UptimeClock, format_uptime};
