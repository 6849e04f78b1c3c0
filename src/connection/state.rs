use crate::types::Envelope;

/// Lifecycle of a single push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Open or on its way there
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// Why a channel reached `Closed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// A terminal message (`completed`/`error`) was received first
    Completed,
    /// The owner tore the channel down
    Requested,
    /// The channel dropped on its own
    Lost(String),
}

impl CloseCause {
    pub fn is_lost(&self) -> bool {
        matches!(self, Self::Lost(_))
    }
}

/// Failure reported to a task consumer
#[derive(Debug, Clone, PartialEq)]
pub enum TaskFault {
    /// The server reported the task failed
    Reported(Envelope),
    /// The channel could not be opened or dropped unexpectedly
    ConnectionLost(String),
}
