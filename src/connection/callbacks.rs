use super::{CloseCause, TaskFault};
use crate::types::{Envelope, PushMessage};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

type ConnectedFn = Arc<dyn Fn() + Send + Sync>;
type EnvelopeFn = Arc<dyn Fn(&Envelope) + Send + Sync>;
type FaultFn = Arc<dyn Fn(&TaskFault) + Send + Sync>;
type CloseFn = Arc<dyn Fn(&CloseCause) + Send + Sync>;
type MessageFn = Arc<dyn Fn(&PushMessage) + Send + Sync>;

/// Handlers registered by the owner of a push channel.
///
/// Every handler is optional and runs synchronously on the channel's driver
/// task, in frame order. A panicking handler is logged and the channel keeps
/// going.
#[derive(Clone, Default)]
pub struct ConnectionCallbacks {
    on_connected: Option<ConnectedFn>,
    on_acknowledged: Option<EnvelopeFn>,
    on_progress: Option<EnvelopeFn>,
    on_complete: Option<EnvelopeFn>,
    on_error: Option<FaultFn>,
    on_disconnected: Option<CloseFn>,
    on_message: Option<MessageFn>,
    on_closed: Option<CloseFn>,
}

impl ConnectionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel reached `Open`
    pub fn on_connected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(f));
        self
    }

    /// Server greeting (`connected`/`connection_established`) with its payload
    pub fn on_acknowledged(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.on_acknowledged = Some(Arc::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    /// Server-reported task failure or a lost connection
    pub fn on_error(mut self, f: impl Fn(&TaskFault) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Channel reached `Closed`, for whatever reason
    pub fn on_disconnected(mut self, f: impl Fn(&CloseCause) + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Arc::new(f));
        self
    }

    /// Every parsed message, after the typed handlers
    pub fn on_message(mut self, f: impl Fn(&PushMessage) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Owner bookkeeping, runs after `on_disconnected`
    pub(crate) fn with_close_hook(mut self, f: impl Fn(&CloseCause) + Send + Sync + 'static) -> Self {
        self.on_closed = Some(Arc::new(f));
        self
    }

    pub(crate) fn connected(&self) {
        if let Some(f) = &self.on_connected {
            guarded("on_connected", || f());
        }
    }

    pub(crate) fn acknowledged(&self, envelope: &Envelope) {
        if let Some(f) = &self.on_acknowledged {
            guarded("on_acknowledged", || f(envelope));
        }
    }

    pub(crate) fn progress(&self, envelope: &Envelope) {
        if let Some(f) = &self.on_progress {
            guarded("on_progress", || f(envelope));
        }
    }

    pub(crate) fn complete(&self, envelope: &Envelope) {
        if let Some(f) = &self.on_complete {
            guarded("on_complete", || f(envelope));
        }
    }

    pub(crate) fn error(&self, fault: &TaskFault) {
        if let Some(f) = &self.on_error {
            guarded("on_error", || f(fault));
        }
    }

    pub(crate) fn disconnected(&self, cause: &CloseCause) {
        if let Some(f) = &self.on_disconnected {
            guarded("on_disconnected", || f(cause));
        }
        if let Some(f) = &self.on_closed {
            guarded("close hook", || f(cause));
        }
    }

    pub(crate) fn message(&self, message: &PushMessage) {
        if let Some(f) = &self.on_message {
            guarded("on_message", || f(message));
        }
    }
}

impl fmt::Debug for ConnectionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCallbacks")
            .field("on_connected", &self.on_connected.is_some())
            .field("on_acknowledged", &self.on_acknowledged.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_disconnected", &self.on_disconnected.is_some())
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

fn guarded(name: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!("{} handler panicked, message dropped", name);
    }
}
