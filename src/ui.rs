//! The only two things the session layer ever asks of the interface: show a
//! message, and move to another route.

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Hook into whatever renders the console
pub trait UiBridge: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
    fn navigate(&self, route: &str);
}

/// Default bridge for headless use: everything goes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUi;

impl UiBridge for TracingUi {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!("[ui] {}", message),
            NoticeLevel::Warning => tracing::warn!("[ui] {}", message),
            NoticeLevel::Error => tracing::error!("[ui] {}", message),
        }
    }

    fn navigate(&self, route: &str) {
        tracing::info!("[ui] navigate to {}", route);
    }
}
